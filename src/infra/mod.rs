pub mod browser;
pub mod http_client;
pub mod resend_mailer;

pub use browser::ChromiumBrowser;
pub use http_client::ReqwestHttp;
pub use resend_mailer::ResendMailer;
