//! Newline-delimited JSON framing.
//!
//! Every [`Frame`] is one JSON document on one line. JSON escapes line
//! breaks inside strings, so a newline always ends a frame.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::Frame;

pub fn encode(frame: &Frame) -> ProtocolResult<String> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

pub fn decode(line: &str) -> ProtocolResult<Frame> {
    Ok(serde_json::from_str(line.trim_end_matches(['\n', '\r']))?)
}

pub struct FrameReader<R: Read> {
    inner: BufReader<R>,
    line: String,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: String::new(),
        }
    }

    /// The next frame, or `None` once the peer has closed the connection.
    /// Blank lines are skipped.
    pub fn read_frame(&mut self) -> ProtocolResult<Option<Frame>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }
            let frame = decode(&self.line)?;
            log::trace!(target: "ipc", "<- {}", frame.describe());
            return Ok(Some(frame));
        }
    }

    /// Like [`read_frame`](Self::read_frame), but a closed connection is an
    /// error.
    pub fn expect_frame(&mut self) -> ProtocolResult<Frame> {
        self.read_frame()?.ok_or(ProtocolError::Closed)
    }
}

pub struct FrameWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> ProtocolResult<()> {
        log::trace!(target: "ipc", "-> {}", frame.describe());
        serde_json::to_writer(&mut self.inner, frame)?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        Ok(())
    }
}
