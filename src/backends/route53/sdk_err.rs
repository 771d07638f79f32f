use crate::err::*;

use aws_sdk_route53::error::{DisplayErrorContext, SdkError};

/// Sorts SDK failures into "the provider answered with a bad status" and
/// "the request never got an answer".
pub fn from_sdk_err<E>(err: SdkError<E>, operation: &str) -> AppErr
where
    E: std::error::Error + Send + Sync + 'static,
{
    let msg = format!("{}: {}", operation, DisplayErrorContext(&err));

    match err.raw_response() {
        Some(raw) => AppErr::ProviderStatus {
            status: raw.status().as_u16(),
            msg,
        },
        None => AppErr::Transport(msg),
    }
}

pub fn missing_change_info(operation: &str) -> AppErr {
    AppErr::ProviderStatus {
        status: 200,
        msg: format!("{}: response carries no ChangeInfo", operation),
    }
}
