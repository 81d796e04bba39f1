//! Minimal `text/event-stream` decoder for the realtime REST streaming API.

/// One server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServerEvent {
    pub name: String,
    pub data: String,
}

/// Incremental decoder: feed raw body chunks, get back complete events.
#[derive(Debug, Default)]
pub(crate) struct EventStreamDecoder {
    /// Undecoded bytes; only complete blocks are turned into text, so a
    /// character split across chunks is never cut in half.
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.contains(&b'\r') {
            self.normalize_line_endings();
        }

        let mut events = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match std::str::from_utf8(&block) {
                Ok(block) => events.extend(parse_block(block)),
                Err(e) => tracing::warn!("Dropping event with invalid UTF-8: {}", e),
            }
        }
        events
    }

    /// Turn `\r\n` into `\n`. A trailing `\r` waits for the next chunk.
    fn normalize_line_endings(&mut self) {
        let mut normalized = Vec::with_capacity(self.buffer.len());
        let mut bytes = self.buffer.iter().copied().peekable();
        while let Some(byte) = bytes.next() {
            if byte == b'\r' && bytes.peek() == Some(&b'\n') {
                continue;
            }
            normalized.push(byte);
        }
        self.buffer = normalized;
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<ServerEvent> {
    let mut name = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => name = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if name.is_none() && data.is_empty() {
        return None;
    }
    Some(ServerEvent {
        name: name.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}
