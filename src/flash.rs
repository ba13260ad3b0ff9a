use axum::{
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

use crate::cookies::{append_cookie, build_cookie, cookie_value, FLASH_COOKIE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Danger => "danger",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        Base64UrlUnpadded::encode_string(&json)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = Base64UrlUnpadded::decode_vec(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        cookie_value(headers, FLASH_COOKIE).and_then(Self::decode)
    }
}

/// 303 to `to`, leaving `flash` for the page that follows.
pub fn redirect_with(to: &str, flash: Flash, secure: bool) -> Response {
    let mut response = Redirect::to(to).into_response();
    append_cookie(
        response.headers_mut(),
        build_cookie(FLASH_COOKIE, &flash.encode(), None, secure),
    );
    response
}
