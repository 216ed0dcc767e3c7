/// Recommended error type for orchestrator entry points and plumbing that
/// does not need a typed terminal error. Compatible with `?` on any error in
/// the taxonomy, so failure kinds survive to the exit-code mapping.
pub type GustResult<T> = anyhow::Result<T>;
