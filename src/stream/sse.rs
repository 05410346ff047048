//! Incremental parser for the labeled-event push-stream convention
//! (`event: name` / `data: payload` lines, blank-line delimited). Chunks may
//! split an event anywhere; the parser buffers partial input and
//! resynchronizes on the next well-formed event.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes off the wire, returning every event completed
    /// by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        // Bare \r\n framing is normalized so the delimiter search below only
        // has to deal with \n\n.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(block.trim_end()) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut name: Option<String> = None;
    let mut data = String::new();

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Comments and unknown fields are ignored per the convention.
    }

    // Unlabeled events default to "message".
    let name = name.unwrap_or_else(|| "message".to_string());
    if data.is_empty() && name == "message" {
        // Nothing usable in this block; skip and resynchronize.
        return None;
    }
    Some(SseEvent { name, data })
}
