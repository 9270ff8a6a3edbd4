/// DataChain - a dataset marketplace backed by a pinning gateway and a chain registry
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `datachain-core`: Content protection, dataset registry and marketplace flows
/// - `datachain-client`: HTTP clients for the pinning gateway and the chain node

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
