pub(crate) mod dirty;

/// The boxed form of a revocation predicate.
pub(crate) type RevokeFn = Box<dyn Fn() -> bool + Send + Sync + 'static>;

#[cfg(feature = "logging")]
pub(crate) fn log_initializer_panic(
    payload: &(dyn std::any::Any + Send + 'static),
    cache_name: Option<&str>,
) {
    // Try to downcast the payload into &str or String.
    //
    // NOTE: Clippy will complain if we use `if let Some(_)` here.
    // https://rust-lang.github.io/rust-clippy/master/index.html#manual_map
    let message: Option<std::borrow::Cow<'_, str>> =
        (payload.downcast_ref::<&str>().map(|s| (*s).into()))
            .or_else(|| payload.downcast_ref::<String>().map(Into::into));

    let cn = cache_name
        .map(|name| format!("[{name}] "))
        .unwrap_or_default();

    if let Some(m) = message {
        log::error!("{cn}Left the cached value unchanged because the initializer panicked at '{m}'");
    } else {
        log::error!("{cn}Left the cached value unchanged because the initializer panicked");
    }
}
