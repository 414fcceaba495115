/// Result of running one enrichment job against a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Completed,
    Skipped(SkipReason),
}

/// Why an enrichment job decided there was nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDone,
    NotConfigured,
    DisabledByUser,
    MissingApiKey,
    UnsupportedModel,
    MissingUrl,
    NoSettings,
    FileExists,
}
