//! Helpers shared by the WebDriver and Selenium RC session clients.

use tracing::debug;

use crate::result::RemoteResult;

/// A remote session whose command timeout can be changed
pub trait SessionTimeout {
    /// The timeout currently in effect, if one was ever set
    fn session_timeout(&self) -> Option<u64>;

    /// Set the session timeout; a no-op when it is already in effect
    ///
    /// # Errors
    ///
    /// The remote call failed.
    fn set_timeout(&mut self, ms: u64) -> RemoteResult<()>;
}

/// Run `op` with `timeout` temporarily applied to the session.
///
/// The previous timeout is restored afterwards. When `op` fails, a failed
/// restore is logged and the original error is returned, except that
/// cancellation from either step always wins.
///
/// # Errors
///
/// Errors from applying the timeout, from `op`, or from the restore after
/// a successful `op`.
pub fn scoped_timeout<S, R, F>(session: &mut S, timeout: Option<u64>, op: F) -> RemoteResult<R>
where
    S: SessionTimeout + ?Sized,
    F: FnOnce(&mut S) -> RemoteResult<R>,
{
    let previous = session.session_timeout();
    let Some(timeout) = timeout.filter(|t| Some(*t) != previous) else {
        return op(session);
    };

    session.set_timeout(timeout)?;
    match op(session) {
        Ok(value) => {
            if let Some(previous) = previous {
                session.set_timeout(previous)?;
            }
            Ok(value)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            if let Some(previous) = previous {
                if let Err(restore) = session.set_timeout(previous) {
                    if restore.is_fatal() {
                        return Err(restore);
                    }
                    debug!(error = %restore, "timeout restore failed");
                }
            }
            Err(err)
        }
    }
}

/// Resolve `url` against `base` the way a browser resolves a link.
///
/// Absolute URLs are kept, `/path` replaces the base path, and anything
/// else is relative to the base's directory.
#[must_use]
pub fn join_url(base: &str, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    let Some((scheme, rest)) = base.split_once("://") else {
        return url.to_string();
    };
    if let Some(network_path) = url.strip_prefix("//") {
        return format!("{scheme}://{network_path}");
    }

    let authority_end = rest.find('/').unwrap_or(rest.len());
    let origin = &base[..scheme.len() + 3 + authority_end];
    if url.starts_with('/') {
        return format!("{origin}{url}");
    }
    if url.is_empty() {
        return base.to_string();
    }

    let path = rest[authority_end..]
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
    format!("{origin}{dir}{url}")
}
