//! Parses the `+<selector>`/`-<selector>` stream-selector grammar used by
//! the CLI and by [`super::StreamSelector::parse_tokens`], grounded on
//! `sample_code/FilterCopySamples.cpp`'s `+`/`-` stream argument handling.
//! A selector is a `RecordableTypeId` (a bare number), a `StreamId`
//! (`"type-instance"`), or a `RecordType` name (`configuration`, `state`,
//! `data`, `tag`).

use crate::error::FilterError;
use crate::model::{RecordType, RecordableTypeId, StreamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTerm {
    Type(RecordableTypeId),
    Stream(StreamId),
    Kind(RecordType),
}

pub fn parse_selector(token: &str) -> Result<(bool, SelectorTerm), FilterError> {
    let mut chars = token.chars();
    let sign = match chars.next() {
        Some('+') => true,
        Some('-') => false,
        _ => return Err(FilterError::InvalidSelector(token.to_string())),
    };
    let rest = chars.as_str();
    let term = parse_term(rest).ok_or_else(|| FilterError::InvalidSelector(token.to_string()))?;
    Ok((sign, term))
}

fn parse_term(s: &str) -> Option<SelectorTerm> {
    if s.is_empty() {
        return None;
    }
    if let Some((type_part, instance_part)) = s.split_once('-') {
        if let (Ok(type_id), Ok(instance_id)) = (type_part.parse::<u16>(), instance_part.parse::<u16>()) {
            return Some(SelectorTerm::Stream(StreamId::new(RecordableTypeId(type_id), instance_id)));
        }
    }
    if let Ok(type_id) = s.parse::<u16>() {
        return Some(SelectorTerm::Type(RecordableTypeId(type_id)));
    }
    match s {
        "configuration" => Some(SelectorTerm::Kind(RecordType::Configuration)),
        "state" => Some(SelectorTerm::Kind(RecordType::State)),
        "data" => Some(SelectorTerm::Kind(RecordType::Data)),
        "tag" => Some(SelectorTerm::Kind(RecordType::Tag)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_stream_and_kind_selectors() {
        assert_eq!(parse_selector("+214").unwrap(), (true, SelectorTerm::Type(RecordableTypeId(214))));
        assert_eq!(
            parse_selector("-214-2").unwrap(),
            (false, SelectorTerm::Stream(StreamId::new(RecordableTypeId(214), 2)))
        );
        assert_eq!(parse_selector("+data").unwrap(), (true, SelectorTerm::Kind(RecordType::Data)));
    }

    #[test]
    fn rejects_a_selector_without_a_sign() {
        assert!(parse_selector("214").is_err());
    }

    #[test]
    fn rejects_garbage_after_a_valid_sign() {
        assert!(parse_selector("+not-a-real-selector").is_err());
    }
}
