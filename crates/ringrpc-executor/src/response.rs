//! Response frames.
//!
//! A response is written with one vectored write. Each frame is its own
//! heap copy so the write record owns, and later frees, every one of them.
//!
//! ```text
//! [0] HTTP/1.0 200 OK\r\n
//! [1] Server: ringrpc/<version>\r\n
//! [2] Content-Type: application/json\r\n
//! [3] content-length: <n>\r\n
//! [4] \r\n
//! [5] <body>
//! ```

use ringrpc_core::buffer::{HeapBuffers, IoBuf};

pub const STATUS_OK: &[u8] = b"HTTP/1.0 200 OK\r\n";
pub const SERVER: &str = concat!("Server: ringrpc/", env!("CARGO_PKG_VERSION"), "\r\n");
pub const CONTENT_TYPE: &[u8] = b"Content-Type: application/json\r\n";
pub const END_OF_HEADERS: &[u8] = b"\r\n";
pub const BAD_REQUEST: &[u8] = b"HTTP/1.0 400 Bad Request\r\n\r\n";

/// Frames produced by `push_headers`.
pub const HEADER_FRAMES: usize = 5;

/// Append the five header frames for a body of `body_len` bytes.
pub fn push_headers(buffers: &HeapBuffers, body_len: usize, frames: &mut Vec<IoBuf>) {
    frames.reserve(HEADER_FRAMES);
    frames.push(buffers.copy_from(STATUS_OK));
    frames.push(buffers.copy_from(SERVER.as_bytes()));
    frames.push(buffers.copy_from(CONTENT_TYPE));
    frames.push(buffers.copy_from(format!("content-length: {body_len}\r\n").as_bytes()));
    frames.push(buffers.copy_from(END_OF_HEADERS));
}

/// 200 response carrying `body`: five header frames plus the body frame.
pub fn ok(buffers: &HeapBuffers, body: &[u8]) -> Vec<IoBuf> {
    let mut frames = Vec::with_capacity(HEADER_FRAMES + 1);
    push_headers(buffers, body.len(), &mut frames);
    frames.push(buffers.copy_from(body));
    frames
}

/// 200 response whose body is the decimal form of `value`.
pub fn ok_value(buffers: &HeapBuffers, value: i64) -> Vec<IoBuf> {
    ok(buffers, value.to_string().as_bytes())
}

/// The single-frame 400 response. No body, no content-length.
pub fn bad_request(buffers: &HeapBuffers) -> Vec<IoBuf> {
    vec![buffers.copy_from(BAD_REQUEST)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frames: Vec<IoBuf>) -> Vec<u8> {
        frames.iter().flat_map(|b| b.iter().copied()).collect()
    }

    #[test]
    fn ok_frames_in_order() {
        let heap = HeapBuffers::new(0);
        let frames = ok_value(&heap, 42);
        assert_eq!(frames.len(), 6);
        assert_eq!(&frames[0][..], STATUS_OK);
        assert!(frames[1].starts_with(b"Server: ringrpc/"));
        assert_eq!(&frames[2][..], CONTENT_TYPE);
        assert_eq!(&frames[3][..], b"content-length: 2\r\n");
        assert_eq!(&frames[4][..], b"\r\n");
        assert_eq!(&frames[5][..], b"42");
    }

    #[test]
    fn every_frame_is_its_own_allocation() {
        let heap = HeapBuffers::new(0);
        let frames = ok(&heap, b"-7");
        assert_eq!(heap.stats().in_use(), 6);
        drop(frames);
        assert_eq!(heap.stats().in_use(), 0);
        assert_eq!(heap.stats().total(), 6);
    }

    #[test]
    fn push_headers_appends_after_existing() {
        let heap = HeapBuffers::new(0);
        let mut frames = vec![heap.copy_from(b"x")];
        push_headers(&heap, 1234, &mut frames);
        assert_eq!(frames.len(), 1 + HEADER_FRAMES);
        assert_eq!(&frames[4][..], b"content-length: 1234\r\n");
    }

    #[test]
    fn bad_request_is_exact() {
        let heap = HeapBuffers::new(0);
        assert_eq!(wire(bad_request(&heap)), b"HTTP/1.0 400 Bad Request\r\n\r\n");
    }

    #[test]
    fn wire_form_of_ok() {
        let heap = HeapBuffers::new(0);
        let text = String::from_utf8(wire(ok_value(&heap, 42))).expect("ascii");
        assert!(text.starts_with("HTTP/1.0 200 OK\r\nServer: ringrpc/"));
        assert!(text.ends_with("Content-Type: application/json\r\ncontent-length: 2\r\n\r\n42"));
    }
}
