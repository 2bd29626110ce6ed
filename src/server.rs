//! HTTP over `embassy-net` TCP: one connection at a time, one request per connection.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::Duration;

use crate::access_point::HTTP_PORT;
use crate::control::http::{self, MAX_HEAD_BYTES};
use crate::control::{Controller, MAX_UPLOAD_BYTES, Reply, Route};
use crate::storage::AnimationStorage;

/// Receive buffer size: a full head plus the largest body.
pub const RECEIVE_BUFFER_BYTES: usize = MAX_HEAD_BYTES + MAX_UPLOAD_BYTES;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept and answer requests forever.
///
/// `buffer` receives each request; after the head is parsed the body is moved to its
/// start and handed to the controller.
pub async fn serve<S: AnimationStorage>(
    stack: Stack<'static>,
    controller: &mut Controller<'_, S>,
    buffer: &mut [u8; RECEIVE_BUFFER_BYTES],
) -> ! {
    let mut rx_buffer = [0u8; 2048];
    let mut tx_buffer = [0u8; 1024];
    info!("HTTP: listening on port {}", HTTP_PORT);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("HTTP: accept failed: {:?}", err);
            continue;
        }

        let reply = match receive(&mut socket, buffer).await {
            Ok((route, body_len)) => {
                debug!("HTTP: {:?} with {} byte body", route, body_len);
                controller.handle(route, buffer, body_len).await
            }
            Err(reply) => reply,
        };
        if let Err(reply) = respond(&mut socket, &reply).await {
            warn!("HTTP: response not sent: {:?}", reply);
        }
        socket.close();
        // Let the FIN go out before the socket buffers are reused.
        if let Err(err) = socket.flush().await {
            debug!("HTTP: flush after close failed: {:?}", err);
        }
    }
}

/// Read one request. On success the body occupies `buffer[..body_len]`.
async fn receive(
    socket: &mut TcpSocket<'_>,
    buffer: &mut [u8; RECEIVE_BUFFER_BYTES],
) -> Result<(Route, usize), Reply> {
    let mut filled = 0;
    let (route, content_length, head_len) = loop {
        filled += read_some(socket, &mut buffer[filled..MAX_HEAD_BYTES]).await?;
        if let Some(head) = http::parse_head(&buffer[..filled])? {
            break (http::route(&head)?, head.content_length, head.head_len);
        }
    };

    buffer.copy_within(head_len..filled, 0);
    let mut body_len = filled - head_len;
    if body_len > content_length {
        body_len = content_length;
    }
    while body_len < content_length {
        body_len += read_some(socket, &mut buffer[body_len..content_length]).await?;
    }
    Ok((route, body_len))
}

async fn read_some(socket: &mut TcpSocket<'_>, into: &mut [u8]) -> Result<usize, Reply> {
    match socket.read(into).await {
        Ok(0) | Err(_) => Err(Reply::BadRequest("Connection closed mid-request")),
        Ok(read) => Ok(read),
    }
}

async fn respond(socket: &mut TcpSocket<'_>, reply: &Reply) -> Result<(), Reply> {
    let response = http::format_response(reply).map_err(|_| *reply)?;
    let mut remaining = response.as_bytes();
    while !remaining.is_empty() {
        match socket.write(remaining).await {
            Ok(0) | Err(_) => return Err(*reply),
            Ok(written) => remaining = &remaining[written..],
        }
    }
    socket.flush().await.map_err(|_| *reply)
}
