//! Process-wide singleton registries.
//!
//! An open, runtime-extensible registry behind a lazily-initialized
//! `OnceLock<Mutex<...>>`, since this format lets host applications plug in
//! decoders for formats (video codecs, custom content blocks) this crate
//! has no built-in knowledge of.

use crate::content_block::codec::Decoder;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Registry of `codec_name -> Decoder`, consulted by `StreamPlayer`
/// implementations (and `VideoFrameHandler`) to dispatch opaque
/// custom-codec and video content blocks.
pub struct DecoderFactory {
    decoders: Mutex<HashMap<String, Arc<dyn Decoder>>>,
}

impl DecoderFactory {
    pub fn register(&self, name: impl Into<String>, decoder: Arc<dyn Decoder>) {
        self.decoders
            .lock()
            .expect("decoder registry poisoned")
            .insert(name.into(), decoder);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.lock().expect("decoder registry poisoned").get(name).cloned()
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.decoders.lock().expect("decoder registry poisoned").keys().cloned().collect()
    }
}

/// The process-wide decoder registry. Empty at startup; host applications
/// register external collaborators (e.g. an h264 or opus decoder) during
/// their own initialization before opening files that need them.
pub fn decoder_factory() -> &'static DecoderFactory {
    static FACTORY: OnceLock<DecoderFactory> = OnceLock::new();
    FACTORY.get_or_init(|| DecoderFactory {
        decoders: Mutex::new(HashMap::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordFormatError;

    struct EchoDecoder;
    impl Decoder for EchoDecoder {
        fn name(&self) -> &str {
            "echo"
        }
        fn decode(&self, data: &[u8]) -> Result<Vec<u8>, RecordFormatError> {
            Ok(data.to_vec())
        }
    }

    #[test]
    fn registered_decoder_is_retrievable_by_name() {
        decoder_factory().register("echo-test", Arc::new(EchoDecoder));
        let decoder = decoder_factory().get("echo-test").expect("just registered");
        assert_eq!(decoder.decode(b"hi").unwrap(), b"hi");
    }

    #[test]
    fn unknown_decoder_name_returns_none() {
        assert!(decoder_factory().get("definitely-not-registered").is_none());
    }
}
