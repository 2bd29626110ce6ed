//! Just enough HTTP/1.1 to serve [`Route`]s over a raw TCP socket.
//!
//! One request per connection; the server always answers with `Connection: close`.

use core::fmt::{self, Write};

use heapless::String;

use super::{MAX_UPLOAD_BYTES, REPLY_BODY_CAPACITY, Reply, Route};

/// Longest request line plus headers accepted.
pub const MAX_HEAD_BYTES: usize = 1024;

/// Capacity of a rendered response (status line, headers, body).
pub const RESPONSE_CAPACITY: usize = REPLY_BODY_CAPACITY + 128;

/// Request method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// Anything else.
    Other,
}

/// The parts of a request head the router needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestHead<'a> {
    /// Request method.
    pub method: Method,
    /// Path without the query string.
    pub path: &'a str,
    /// Text after `?`, if any.
    pub query: Option<&'a str>,
    /// `Content-Length`, or 0 when absent.
    pub content_length: usize,
    /// Bytes up to and including the blank line; the body starts here.
    pub head_len: usize,
}

/// Parse a request head from the start of `bytes`.
///
/// Returns `Ok(None)` when the blank line ending the head has not arrived yet.
///
/// ```rust
/// use matrix_player::control::http::{Method, parse_head};
///
/// let request = b"POST /upload HTTP/1.1\r\nContent-Length: 2\r\n\r\n[]";
/// let head = parse_head(request).ok().flatten().expect("complete head");
/// assert_eq!(head.method, Method::Post);
/// assert_eq!(head.path, "/upload");
/// assert_eq!(head.content_length, 2);
/// assert_eq!(&request[head.head_len..], b"[]");
/// ```
///
/// # Errors
///
/// Returns the [`Reply`] to send back when the head is malformed, too long, or announces
/// a body over [`MAX_UPLOAD_BYTES`].
pub fn parse_head(bytes: &[u8]) -> Result<Option<RequestHead<'_>>, Reply> {
    let Some(end) = bytes.windows(4).position(|window| window == b"\r\n\r\n") else {
        if bytes.len() >= MAX_HEAD_BYTES {
            return Err(Reply::BadRequest("Request head too large"));
        }
        return Ok(None);
    };
    let head_len = end + 4;
    let text =
        core::str::from_utf8(&bytes[..end]).map_err(|_| Reply::BadRequest("Bad request head"))?;

    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Reply::BadRequest("Bad request line"));
    };
    let method = match method {
        "GET" => Method::Get,
        "POST" => Method::Post,
        _ => Method::Other,
    };
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let mut content_length = 0;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| Reply::BadRequest("Bad Content-Length"))?;
        }
    }
    if content_length > MAX_UPLOAD_BYTES {
        return Err(Reply::PayloadTooLarge);
    }

    Ok(Some(RequestHead {
        method,
        path,
        query,
        content_length,
        head_len,
    }))
}

/// Map a request to a [`Route`].
///
/// # Errors
///
/// Returns [`Reply::NotFound`], [`Reply::MethodNotAllowed`], or a
/// [`Reply::BadRequest`] for a missing or out-of-range brightness.
pub fn route(head: &RequestHead<'_>) -> Result<Route, Reply> {
    let route = match head.path {
        "/upload" => {
            return match head.method {
                Method::Post => Ok(Route::Upload),
                _ => Err(Reply::MethodNotAllowed),
            };
        }
        "/" | "/index.html" => Route::Index,
        "/play" => Route::Play,
        "/stop" => Route::Stop,
        "/info" => Route::Info,
        "/loadLastAni" => Route::ReloadLast,
        "/setBrightness" => Route::SetBrightness(brightness_param(head.query)?),
        _ => return Err(Reply::NotFound),
    };
    match head.method {
        Method::Get => Ok(route),
        _ => Err(Reply::MethodNotAllowed),
    }
}

fn brightness_param(query: Option<&str>) -> Result<u8, Reply> {
    query
        .into_iter()
        .flat_map(|query| query.split('&'))
        .find_map(|pair| pair.strip_prefix("value="))
        .and_then(|value| value.parse().ok())
        .ok_or(Reply::BadRequest("value must be an integer 0-255"))
}

/// Render `reply` as a complete HTTP response.
///
/// # Errors
///
/// Returns [`fmt::Error`] if the response would exceed [`RESPONSE_CAPACITY`].
pub fn format_response(reply: &Reply) -> Result<String<RESPONSE_CAPACITY>, fmt::Error> {
    let body = reply.body()?;
    let mut response = String::new();
    write!(
        response,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status(),
        reason_phrase(reply.status()),
        reply.content_type(),
        body.len(),
        body
    )?;
    Ok(response)
}

const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}
