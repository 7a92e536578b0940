//! Pure transformations from user chunks to canonical records.

use agentd_contract::{
    ChunkContent, ChunkMessage, ContentBlock, InputContent, InputMessage, InputPart, InputRole,
    Message, MessageStatus, Role, RunChunk, RunUsage,
};

/// Normalise a chunk message's content into ordered text blocks.
///
/// A bare string wraps into a single block; a part list keeps the parts
/// whose kind is `text`, in order. A missing message yields no blocks.
pub fn to_content_blocks(message: Option<&ChunkMessage>) -> Vec<ContentBlock> {
    let Some(message) = message else {
        return Vec::new();
    };
    match &message.content {
        ChunkContent::Text(text) => vec![ContentBlock::text(text.clone())],
        ChunkContent::Parts(parts) => parts
            .iter()
            .filter(|part| part.kind == "text")
            .map(|part| ContentBlock::text(part.text.clone().unwrap_or_default()))
            .collect(),
    }
}

/// Result of draining a whole chunk stream.
#[derive(Debug, Clone)]
pub struct CollectedRun {
    pub output: Vec<Message>,
    pub usage: Option<RunUsage>,
}

/// Incremental chunk accumulator. Chunks carrying a `message` become fresh
/// completed assistant messages; chunks carrying `usage` accumulate token
/// counters. Chunks with neither are no-ops.
#[derive(Debug)]
pub struct ChunkCollector {
    run_id: String,
    thread_id: Option<String>,
    output: Vec<Message>,
    prompt_tokens: u64,
    completion_tokens: u64,
    has_usage: bool,
}

impl ChunkCollector {
    pub fn new(run_id: impl Into<String>, thread_id: Option<&str>) -> Self {
        Self {
            run_id: run_id.into(),
            thread_id: thread_id.map(str::to_string),
            output: Vec::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            has_usage: false,
        }
    }

    pub fn process(&mut self, chunk: &RunChunk) {
        if let Some(chunk_message) = chunk.message.as_ref() {
            let mut message = Message::new(
                Role::Assistant,
                MessageStatus::Completed,
                to_content_blocks(Some(chunk_message)),
            )
            .with_run_id(self.run_id.clone());
            message.thread_id = self.thread_id.clone();
            self.output.push(message);
        }
        if let Some(usage) = chunk.usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            self.has_usage = true;
        }
    }

    pub fn finish(self) -> CollectedRun {
        CollectedRun {
            output: self.output,
            usage: self
                .has_usage
                .then(|| RunUsage::new(self.prompt_tokens, self.completion_tokens)),
        }
    }
}

/// Drain an already-buffered chunk sequence.
pub fn collect(chunks: &[RunChunk], run_id: &str, thread_id: Option<&str>) -> CollectedRun {
    let mut collector = ChunkCollector::new(run_id, thread_id);
    for chunk in chunks {
        collector.process(chunk);
    }
    collector.finish()
}

/// Convert submitted input messages to stored thread messages, dropping
/// `system` entries.
pub fn input_to_messages(input: &[InputMessage], thread_id: &str, run_id: &str) -> Vec<Message> {
    input
        .iter()
        .filter_map(|input_message| {
            let role = match input_message.role {
                InputRole::User => Role::User,
                InputRole::Assistant => Role::Assistant,
                InputRole::System => return None,
            };
            let content = match &input_message.content {
                InputContent::Text(text) => vec![ContentBlock::text(text.clone())],
                InputContent::Parts(parts) => parts
                    .iter()
                    .map(|InputPart::Text { text }| ContentBlock::text(text.clone()))
                    .collect(),
            };
            let mut message = Message::new(role, MessageStatus::Completed, content)
                .with_thread_id(thread_id)
                .with_run_id(run_id);
            message.metadata = input_message.metadata.clone();
            Some(message)
        })
        .collect()
}
