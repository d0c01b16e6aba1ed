//! `Authorization` header scheme classification.
//!
//! Classification is by literal prefix, in a fixed priority order that must
//! not change: once a prefix matches syntactically, later schemes are never
//! attempted — even if the matched branch ultimately fails to authenticate.

/// The scheme a header classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    /// Platform authorization reference (loopback only).
    AuthRef,
    /// Peer-credential assertion (unix-domain sockets only).
    PeerCred,
    /// Previously-issued local token (loopback only).
    Local,
    /// HTTP Basic.
    Basic,
    /// Kerberos / GSSAPI.
    Negotiate,
}

impl SchemeKind {
    /// Scheme label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthRef => "AuthRef",
            Self::PeerCred => "PeerCred",
            Self::Local => "Local",
            Self::Basic => "Basic",
            Self::Negotiate => "Negotiate",
        }
    }
}

/// A classified header: the scheme plus whatever followed the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeToken<'a> {
    /// `AuthRef <base64 reference>`
    AuthRef(&'a str),
    /// `PeerCred <username>`
    PeerCred(&'a str),
    /// `Local <token>`
    Local(&'a str),
    /// `Basic <base64 user:pass>`
    Basic(&'a str),
    /// `Negotiate <base64 GSSAPI token>` (payload may be empty)
    Negotiate(&'a str),
    /// Anything else; carries the scheme word for logging.
    Unknown(&'a str),
}

impl<'a> SchemeToken<'a> {
    /// Classify a raw header value.
    ///
    /// The priority order AuthRef → PeerCred → Local → Basic → Negotiate is
    /// load-bearing: a syntactic match consumes the header.
    #[must_use]
    pub fn classify(header: &'a str) -> Self {
        if let Some(rest) = header.strip_prefix("AuthRef ") {
            Self::AuthRef(rest.trim())
        } else if let Some(rest) = header.strip_prefix("PeerCred ") {
            Self::PeerCred(rest.trim())
        } else if let Some(rest) = header.strip_prefix("Local ") {
            Self::Local(rest.trim())
        } else if let Some(rest) = header.strip_prefix("Basic ") {
            Self::Basic(rest.trim())
        } else if let Some(rest) = header.strip_prefix("Negotiate") {
            Self::Negotiate(rest.trim())
        } else {
            Self::Unknown(header.split_whitespace().next().unwrap_or(header))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_each_scheme() {
        assert_eq!(
            SchemeToken::classify("AuthRef QUJD"),
            SchemeToken::AuthRef("QUJD")
        );
        assert_eq!(
            SchemeToken::classify("PeerCred alice"),
            SchemeToken::PeerCred("alice")
        );
        assert_eq!(
            SchemeToken::classify("Local 0123456789abcdef"),
            SchemeToken::Local("0123456789abcdef")
        );
        assert_eq!(
            SchemeToken::classify("Basic dXNlcjpwYXNz"),
            SchemeToken::Basic("dXNlcjpwYXNz")
        );
        assert_eq!(
            SchemeToken::classify("Negotiate YIIB..."),
            SchemeToken::Negotiate("YIIB...")
        );
    }

    #[test]
    fn negotiate_without_token_classifies_with_empty_payload() {
        assert_eq!(SchemeToken::classify("Negotiate"), SchemeToken::Negotiate(""));
    }

    #[test]
    fn unknown_scheme_carries_scheme_word() {
        assert_eq!(
            SchemeToken::classify("Bearer abc.def.ghi"),
            SchemeToken::Unknown("Bearer")
        );
        assert_eq!(
            SchemeToken::classify("Digest username=\"a\""),
            SchemeToken::Unknown("Digest")
        );
    }

    #[test]
    fn prefix_match_is_case_sensitive_like_the_original() {
        // "basic" is not the literal prefix the dispatcher recognises
        assert!(matches!(
            SchemeToken::classify("basic dXNlcjpwYXNz"),
            SchemeToken::Unknown(_)
        ));
    }

    #[test]
    fn first_matching_prefix_wins() {
        // A Basic payload that happens to *contain* "Negotiate" still
        // classifies as Basic
        assert_eq!(
            SchemeToken::classify("Basic Negotiate"),
            SchemeToken::Basic("Negotiate")
        );
    }
}
