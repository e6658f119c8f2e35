//! Authorization URL construction.

use crate::session::OAuthSession;
use url::Url;

/// Builds the authorization URL the user opens in a browser.
///
/// Pure: the same session always yields the same URL.
#[must_use]
pub fn authorization_url(session: &OAuthSession) -> Url {
    let mut url = session.auth_url().clone();

    url.query_pairs_mut()
        .append_pair("client_id", session.client_id())
        .append_pair("redirect_uri", session.redirect_uri())
        .append_pair("scope", session.scope())
        .append_pair("state", session.csrf_state())
        .append_pair("response_type", "code");

    url
}
