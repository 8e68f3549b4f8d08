pub mod extract;
pub mod record;
pub mod tokens;

use tracing::debug;

use extract::Extractor;
use record::ProgrammeRecord;

/// Two-stage pipeline: markup → tokens → programme records for `expected`.
pub fn extract_document(
    extractor: &mut Extractor,
    expected: &str,
    markup: &str,
) -> Vec<ProgrammeRecord> {
    extractor.begin_document(expected);
    let tokens = tokens::tokenize(markup);
    let records: Vec<_> = tokens.iter().filter_map(|t| extractor.feed(t)).collect();
    debug!(
        expected,
        tokens = tokens.len(),
        records = records.len(),
        seen = extractor.seen_count(),
        final_step = ?extractor.step(),
        "Extracted schedule page"
    );
    records
}

// ── Tests ──
