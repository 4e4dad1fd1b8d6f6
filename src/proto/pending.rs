use std::time::Instant;

use crate::error::Error;
use crate::packet::Multipart;

/// Accumulates fragments of a multi-part `ServerCommand` response, keyed by
/// `index` within a fixed `total` (spec §4.2 "Fragment assembly").
#[derive(Debug)]
struct FragmentBuffer {
    total: u8,
    slots: Vec<Option<String>>,
}

impl FragmentBuffer {
    fn new(total: u8) -> Self {
        Self {
            total,
            slots: vec![None; total as usize],
        }
    }

    fn insert(&mut self, index: u8, text: String) -> Result<(), Error> {
        if index >= self.total {
            return Err(Error::MalformedPacket("fragment index out of range"));
        }
        // Duplicate indices are tolerated; per spec §4.2 this is
        // conformant either way since payloads for a given index must be
        // identical. We take last-write-wins.
        self.slots[index as usize] = Some(text);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn assemble(self) -> String {
        self.slots.into_iter().flatten().collect::<Vec<_>>().concat()
    }
}

/// An outstanding command awaiting a (possibly fragmented) response.
///
/// Retransmit/overall-timeout scheduling is the connector's job (it owns
/// the clock that matters for I/O timing); this type only tracks fragment
/// reassembly, keyed by the sequence the connector allocated.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub(crate) sequence: u8,
    pub(crate) sent_at: Instant,
    fragments: Option<FragmentBuffer>,
}

impl PendingCommand {
    pub(crate) fn new(sequence: u8, sent_at: Instant) -> Self {
        Self {
            sequence,
            sent_at,
            fragments: None,
        }
    }

    /// Feeds one command-response fragment. `multipart` is `None` for a
    /// single-part response, equivalent to a one-fragment response with
    /// `total = 1, index = 0`.
    ///
    /// Returns `Ok(Some(text))` once every fragment has been observed,
    /// with fragments concatenated in ascending index order. Returns
    /// `Err` if a later fragment declares a different `total` than the
    /// first one observed for this sequence (spec §4.2).
    pub(crate) fn observe(
        &mut self,
        multipart: Option<Multipart>,
        text: String,
    ) -> Result<Option<String>, Error> {
        let (total, index) = match multipart {
            Some(mp) => (mp.total, mp.index),
            None => (1, 0),
        };

        match &mut self.fragments {
            None => {
                let mut buffer = FragmentBuffer::new(total);
                buffer.insert(index, text)?;
                let complete = buffer.is_complete();
                self.fragments = Some(buffer);
                Ok(complete.then(|| self.fragments.take().unwrap().assemble()))
            }
            Some(buffer) => {
                if buffer.total != total {
                    return Err(Error::MalformedPacket(
                        "fragment total changed mid-assembly",
                    ));
                }
                buffer.insert(index, text)?;
                if buffer.is_complete() {
                    Ok(Some(self.fragments.take().unwrap().assemble()))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
