//! 外部转换能力
//!
//! 编排器只依赖一个异步函数 `text -> text | failure`，不关心背后的服务、
//! 模型或提示词。任何 `Fn(String) -> impl Future<Output = TranslationResult<String>>`
//! 都自动实现 [`Transform`]。

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::translation::error::TranslationResult;

/// 文本转换能力
pub trait Transform: Send + Sync {
    fn transform(&self, text: String) -> BoxFuture<'_, TranslationResult<String>>;
}

impl<F, Fut> Transform for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = TranslationResult<String>> + Send + 'static,
{
    fn transform(&self, text: String) -> BoxFuture<'_, TranslationResult<String>> {
        (self)(text).boxed()
    }
}

/// 去掉模型输出外层的代码围栏
///
/// 第一行是 ```` ```html ```` 时删除第一行，最后一行是 ```` ``` ```` 时删除最后一行。
pub fn sanitize_fenced_output(output: &str) -> String {
    let mut lines: Vec<&str> = output.split('\n').collect();

    if lines.first().is_some_and(|line| line.trim() == "```html") {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::{helpers, TranslationError};

    #[tokio::test]
    async fn test_closures_are_transforms() {
        let upper = |text: String| async move { Ok::<_, TranslationError>(text.to_uppercase()) };
        assert_eq!(upper.transform("abc".to_string()).await.unwrap(), "ABC");

        let failing =
            |_text: String| async move { Err::<String, _>(helpers::transform_error("quota")) };
        assert!(failing.transform("abc".to_string()).await.is_err());
    }

    #[test]
    fn test_fences_are_stripped() {
        let output = "```html\n<p>Hallo.</p>\n```";
        assert_eq!(sanitize_fenced_output(output), "<p>Hallo.</p>");
    }

    #[test]
    fn test_unfenced_output_is_unchanged() {
        let output = "<p>Hallo.</p>\n<p>Welt.</p>";
        assert_eq!(sanitize_fenced_output(output), output);
    }

    #[test]
    fn test_only_outer_fences_are_removed() {
        let output = "```html\n<pre>```</pre>";
        assert_eq!(sanitize_fenced_output(output), "<pre>```</pre>");
    }
}
