//! Locale extraction stage.

use http::header::ACCEPT_LANGUAGE;

use crate::handler::BoxFuture;
use crate::locale::Locale;
use crate::request::Request;
use crate::writer::ResponseWriter;

use super::{Middleware, Next};

/// Resolves the request locale from the first `Accept-Language` entry.
///
/// Never rejects. Without a usable header the context keeps the service's
/// default locale, and lookups degrade to raw keys if that is not loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocaleStage;

impl Middleware for LocaleStage {
    fn execute<'a>(&'a self, mut req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            if let Some(locale) = req.header(ACCEPT_LANGUAGE.as_str()).and_then(Locale::from_accept_language) {
                req.context.set_locale(locale);
            }
            next.run(req, writer).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::context::RequestContext;
    use crate::domain::BoxError;
    use crate::handler::Handler;
    use crate::middleware::{Chain, ErrorHandler};
    use crate::request::tests::request;
    use crate::response::Response;
    use crate::status::Status;

    async fn resolved(headers: &[(&str, &str)]) -> String {
        let seen = Arc::new(Mutex::new(String::new()));
        let out = Arc::clone(&seen);
        let handler = (move |req: Request| {
            let out = Arc::clone(&out);
            async move {
                *out.lock().unwrap() = req.context().locale().to_string();
                Ok::<_, BoxError>(Response::status(Status::NoContent))
            }
        })
        .into_boxed_handler();
        let errors: Arc<dyn ErrorHandler> =
            Arc::new(|_: &RequestContext, _: &mut ResponseWriter, _: BoxError, _: Status| unreachable!());
        let stages: [Arc<dyn Middleware>; 1] = [Arc::new(LocaleStage)];

        let mut writer = ResponseWriter::new();
        Chain::new(handler, errors, &stages).call(request("/", headers, ""), &mut writer).await;
        let locale = seen.lock().unwrap().clone();
        locale
    }

    #[tokio::test]
    async fn header_sets_locale() {
        assert_eq!(resolved(&[("Accept-Language", "es")]).await, "es");
        assert_eq!(resolved(&[("Accept-Language", "pt-BR,pt;q=0.9,en;q=0.5")]).await, "pt-BR");
    }

    #[tokio::test]
    async fn missing_header_keeps_default() {
        // `request()` builds contexts with the `en` default
        assert_eq!(resolved(&[]).await, "en");
    }
}
