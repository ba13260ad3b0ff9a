//! Server-rendered HTML pages.

use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{
    auth::{dto::FieldErrors, services::CurrentUser},
    cookies::{append_cookie, removal_cookie, FLASH_COOKIE},
    files::ListingItem,
    flash::Flash,
    state::AppState,
};

/// Per-request data every page needs: who is logged in and the pending flash.
#[derive(Debug, Default)]
pub struct PageContext {
    pub username: Option<String>,
    pub flash: Option<Flash>,
    pub secure_cookies: bool,
}

impl PageContext {
    pub fn new(state: &AppState, headers: &HeaderMap, user: Option<&CurrentUser>) -> Self {
        Self {
            username: user.map(|c| c.user.username.clone()),
            flash: Flash::from_headers(headers),
            secure_cookies: state.config.session.cookie_secure,
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wraps a rendered page; a displayed flash is cleared so it shows once.
pub fn respond(ctx: &PageContext, status: StatusCode, html: String) -> Response {
    let mut response = (status, [(CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response();
    if ctx.flash.is_some() {
        append_cookie(
            response.headers_mut(),
            removal_cookie(FLASH_COOKIE, ctx.secure_cookies),
        );
    }
    response
}

fn layout(ctx: &PageContext, title: &str, body: &str) -> String {
    let nav = match &ctx.username {
        Some(name) => format!(
            "<span class=\"user\">{}</span> <a href=\"/logout\">Log out</a>",
            html_escape(name)
        ),
        None => "<a href=\"/login\">Log in</a> <a href=\"/register\">Register</a>".to_string(),
    };
    let flash = ctx
        .flash
        .as_ref()
        .map(|f| {
            format!(
                "<div class=\"flash flash-{}\">{}</div>\n",
                f.level.as_str(),
                html_escape(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n</head>\n<body>\n\
<nav><a href=\"/\">Home</a> {nav}</nav>\n{flash}<main>\n{body}</main>\n</body>\n</html>\n",
        title = html_escape(title),
    )
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .for_field(field)
        .map(|m| format!("<span class=\"error\">{}</span>", html_escape(m)))
        .collect()
}

pub fn index(ctx: &PageContext) -> String {
    let body = if ctx.username.is_some() {
        "<h1>Yandex.Disk browser</h1>\n\
<form method=\"get\" action=\"/files\">\n\
<label>Public key <input type=\"text\" name=\"public_key\"/></label>\n\
<label>Path <input type=\"text\" name=\"path\" placeholder=\"/\"/></label>\n\
<button type=\"submit\">Browse</button>\n</form>\n"
    } else {
        "<h1>Yandex.Disk browser</h1>\n<p>Log in to browse public shares.</p>\n"
    };
    layout(ctx, "Home", body)
}

pub fn login(ctx: &PageContext, email: &str, errors: &FieldErrors) -> String {
    let body = format!(
        "<h1>Log in</h1>\n<form method=\"post\" action=\"/login\">\n\
<label>Email <input type=\"email\" name=\"email\" value=\"{email}\"/></label>{email_err}\n\
<label>Password <input type=\"password\" name=\"password\"/></label>{password_err}\n\
<button type=\"submit\">Log in</button>\n</form>\n",
        email = html_escape(email),
        email_err = field_errors(errors, "email"),
        password_err = field_errors(errors, "password"),
    );
    layout(ctx, "Log in", &body)
}

pub fn register(ctx: &PageContext, username: &str, email: &str, errors: &FieldErrors) -> String {
    let body = format!(
        "<h1>Register</h1>\n<form method=\"post\" action=\"/register\">\n\
<label>Username <input type=\"text\" name=\"username\" value=\"{username}\"/></label>{username_err}\n\
<label>Email <input type=\"email\" name=\"email\" value=\"{email}\"/></label>{email_err}\n\
<label>Password <input type=\"password\" name=\"password\"/></label>{password_err}\n\
<label>Confirm password <input type=\"password\" name=\"confirm_password\"/></label>{confirm_err}\n\
<button type=\"submit\">Register</button>\n</form>\n",
        username = html_escape(username),
        email = html_escape(email),
        username_err = field_errors(errors, "username"),
        email_err = field_errors(errors, "email"),
        password_err = field_errors(errors, "password"),
        confirm_err = field_errors(errors, "confirm_password"),
    );
    layout(ctx, "Register", &body)
}

pub fn files(ctx: &PageContext, public_key: &str, path: &str, items: &[ListingItem]) -> String {
    let mut body = format!(
        "<h1>Files</h1>\n<p class=\"path\">{}</p>\n",
        html_escape(path)
    );
    if let Some(parent) = crate::files::parent_path(path) {
        body.push_str(&format!(
            "<p><a class=\"up\" href=\"{}\">..</a></p>\n",
            html_escape(&crate::files::files_href(public_key, &parent))
        ));
    }

    if items.is_empty() {
        body.push_str("<p class=\"empty\">This folder is empty.</p>\n");
        return layout(ctx, "Files", &body);
    }

    body.push_str("<table class=\"listing\">\n<tr><th>Name</th><th>Type</th><th>Size</th></tr>\n");
    for item in items {
        let name = html_escape(&item.name);
        let cell = if item.is_dir() {
            format!(
                "<a href=\"{}\">{name}</a>",
                html_escape(&crate::files::files_href(public_key, &item.path))
            )
        } else if let Some(url) = &item.download_url {
            format!("<a href=\"{}\" rel=\"noreferrer\">{name}</a>", html_escape(url))
        } else {
            name
        };
        let size = item.size.map(|s| s.to_string()).unwrap_or_default();
        let kind = item.mime_type.as_deref().unwrap_or(&item.kind);
        body.push_str(&format!(
            "<tr class=\"item\"><td>{cell}</td><td>{}</td><td>{size}</td></tr>\n",
            html_escape(kind)
        ));
    }
    body.push_str("</table>\n");
    layout(ctx, "Files", &body)
}

pub fn internal_error() -> String {
    layout(
        &PageContext::default(),
        "Error",
        "<h1>Something went wrong</h1>\n<p>Please try again later.</p>\n",
    )
}
