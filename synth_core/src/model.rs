//! Incremental-inference boundary.
//!
//! The pipeline treats the synthesis model as an external collaborator: it
//! asks for an utterance at a given chunk granularity and consumes whatever
//! raw sample chunks inference yields, in order.

use crate::AudioFormat;

/// Samples per granularity unit.  A request's `stream_chunk_size` of N asks
/// for chunks of N hops, the hop size the streaming path has always used.
pub const CHUNK_HOP_SAMPLES: usize = 256;

pub type SampleChunks = Box<dyn Iterator<Item = anyhow::Result<Vec<f32>>> + Send>;

pub trait SpeechModel: Send + Sync {
    /// Output format of every chunk the model produces.
    fn format(&self) -> AudioFormat;

    /// Incremental inference.  `chunk_size` is the requested granularity in
    /// hops; the returned iterator yields exactly as many chunks as
    /// inference produces, in order.
    fn stream(
        &self,
        voice: &str,
        text: &str,
        language: &str,
        chunk_size: usize,
    ) -> anyhow::Result<SampleChunks>;

    /// Whole-utterance inference.
    fn synthesize(&self, voice: &str, text: &str, language: &str) -> anyhow::Result<Vec<f32>>;
}

/// Iterator adapter regrouping model output into chunks of
/// `chunk_size * CHUNK_HOP_SAMPLES` samples, with a final short remainder.
///
/// Sample order is preserved.  An inner error is forwarded once and ends the
/// stream; buffered samples behind the error are discarded.
pub struct Rechunk<I> {
    inner: I,
    pending: Vec<f32>,
    chunk_samples: usize,
    done: bool,
}

impl<I> Rechunk<I>
where
    I: Iterator<Item = anyhow::Result<Vec<f32>>>,
{
    pub fn new(inner: I, chunk_size: usize) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            chunk_samples: chunk_size.max(1) * CHUNK_HOP_SAMPLES,
            done: false,
        }
    }
}

impl<I> Iterator for Rechunk<I>
where
    I: Iterator<Item = anyhow::Result<Vec<f32>>>,
{
    type Item = anyhow::Result<Vec<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.pending.len() < self.chunk_samples {
            match self.inner.next() {
                Some(Ok(samples)) => self.pending.extend(samples),
                Some(Err(e)) => {
                    self.done = true;
                    self.pending.clear();
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if self.pending.is_empty() {
                        return None;
                    }
                    return Some(Ok(std::mem::take(&mut self.pending)));
                }
            }
        }

        let rest = self.pending.split_off(self.chunk_samples);
        let chunk = std::mem::replace(&mut self.pending, rest);
        Some(Ok(chunk))
    }
}
