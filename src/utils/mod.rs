pub mod secret;
pub use secret::SecretString;
pub mod url_validation;
pub use url_validation::{
    UrlValidationError, channel_namespace, channel_url, endpoint_url, validate_base_url,
};
