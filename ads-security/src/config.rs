//! Secure ADS authentication configuration

use crate::derive::PskCredentials;
use crate::error::AdsResult;
use crate::tls::{self, TlsIdentity};
use ads_core::AmsNetId;
use ads_session::{Credentials, TlsConnectFlags, TlsConnectInfo};
use rustls::pki_types::CertificateDer;
use rustls::ClientConfig;
use std::sync::Arc;

/// Authentication mode of a Secure ADS connection
///
/// A closed sum: pattern-matching on the variant selects the transport
/// pipeline (rustls for the certificate modes, the PSK engine for
/// [`SecureAdsConfig::Psk`]) and the flags of the `TlsConnectInfo`
/// request.
#[derive(Debug, Clone)]
pub enum SecureAdsConfig {
    /// Self-signed client certificate, pinned by the peer
    ///
    /// With `credentials` present the connect registers a route on the
    /// peer (`AddRemote`); without them it uses an established route.
    SelfSigned {
        identity: TlsIdentity,
        credentials: Option<Credentials>,
        hostname: Option<String>,
        /// Ask the peer to register the route under the caller's IP
        use_ip_addr: bool,
        /// Ask the peer to skip the certificate common-name check
        ignore_cn: bool,
    },
    /// Client and server certificates issued by a shared authority
    SharedCa {
        identity: TlsIdentity,
        ca_certs: Vec<CertificateDer<'static>>,
        hostname: Option<String>,
    },
    /// Pre-shared key
    Psk {
        credentials: PskCredentials,
        hostname: Option<String>,
    },
}

impl SecureAdsConfig {
    /// Self-Signed mode over an established route
    pub fn self_signed(identity: TlsIdentity) -> Self {
        SecureAdsConfig::SelfSigned {
            identity,
            credentials: None,
            hostname: None,
            use_ip_addr: false,
            ignore_cn: false,
        }
    }

    /// Self-Signed mode registering a route on the peer
    pub fn self_signed_route_registration(identity: TlsIdentity, credentials: Credentials) -> Self {
        SecureAdsConfig::SelfSigned {
            identity,
            credentials: Some(credentials),
            hostname: None,
            use_ip_addr: false,
            ignore_cn: false,
        }
    }

    /// Shared CA mode
    pub fn shared_ca(identity: TlsIdentity, ca_certs: Vec<CertificateDer<'static>>) -> Self {
        SecureAdsConfig::SharedCa {
            identity,
            ca_certs,
            hostname: None,
        }
    }

    /// PSK mode
    pub fn psk(credentials: PskCredentials) -> Self {
        SecureAdsConfig::Psk {
            credentials,
            hostname: None,
        }
    }

    /// Set the hostname announced in the `TlsConnectInfo` request
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        let value = Some(hostname.into());
        match &mut self {
            SecureAdsConfig::SelfSigned { hostname, .. } => *hostname = value,
            SecureAdsConfig::SharedCa { hostname, .. } => *hostname = value,
            SecureAdsConfig::Psk { hostname, .. } => *hostname = value,
        }
        self
    }

    /// Hostname announced to the peer, if configured
    pub fn hostname(&self) -> Option<&str> {
        match self {
            SecureAdsConfig::SelfSigned { hostname, .. } => hostname.as_deref(),
            SecureAdsConfig::SharedCa { hostname, .. } => hostname.as_deref(),
            SecureAdsConfig::Psk { hostname, .. } => hostname.as_deref(),
        }
    }

    /// Flags of the `TlsConnectInfo` request for this mode
    pub fn connect_flags(&self) -> TlsConnectFlags {
        match self {
            SecureAdsConfig::SelfSigned {
                credentials: None, ..
            } => TlsConnectFlags::SELF_SIGNED,
            SecureAdsConfig::SelfSigned {
                credentials: Some(_),
                use_ip_addr,
                ignore_cn,
                ..
            } => {
                let mut flags = TlsConnectFlags::ADD_REMOTE | TlsConnectFlags::SELF_SIGNED;
                if *use_ip_addr {
                    flags |= TlsConnectFlags::IP_ADDR;
                }
                if *ignore_cn {
                    flags |= TlsConnectFlags::IGNORE_CN;
                }
                flags
            }
            SecureAdsConfig::SharedCa { .. } | SecureAdsConfig::Psk { .. } => {
                TlsConnectFlags::empty()
            }
        }
    }

    /// Build the `TlsConnectInfo` request for this mode
    pub fn connect_info_request(&self, source_net_id: AmsNetId) -> TlsConnectInfo {
        let credentials = match self {
            SecureAdsConfig::SelfSigned { credentials, .. } => credentials.clone(),
            _ => None,
        };
        TlsConnectInfo::request(
            self.connect_flags(),
            source_net_id,
            self.hostname().unwrap_or(""),
            credentials,
        )
    }

    /// rustls configuration for the certificate modes; `None` for PSK
    pub fn tls_client_config(&self) -> AdsResult<Option<Arc<ClientConfig>>> {
        match self {
            SecureAdsConfig::SelfSigned { identity, .. } => {
                Ok(Some(tls::self_signed_client_config(identity.clone())?))
            }
            SecureAdsConfig::SharedCa {
                identity, ca_certs, ..
            } => Ok(Some(tls::shared_ca_client_config(
                identity.clone(),
                ca_certs,
            )?)),
            SecureAdsConfig::Psk { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psk_config() -> SecureAdsConfig {
        SecureAdsConfig::psk(PskCredentials::derive("client", "secret").unwrap())
    }

    #[test]
    fn test_psk_connect_flags_are_empty() {
        let config = psk_config();
        assert_eq!(config.connect_flags(), TlsConnectFlags::empty());
    }

    #[test]
    fn test_psk_request_has_no_credentials() {
        let config = psk_config().with_hostname("station");
        let request = config.connect_info_request("10.20.30.40.1.1".parse().unwrap());
        assert_eq!(request.credentials, None);
        assert_eq!(request.hostname, "station");
        assert_eq!(request.flags, TlsConnectFlags::empty());
    }

    #[test]
    fn test_self_signed_flag_table() {
        // identity material is irrelevant to flag derivation
        let key = rustls::pki_types::PrivateKeyDer::Pkcs8(
            rustls::pki_types::PrivatePkcs8KeyDer::from(vec![0u8; 16]),
        );
        let identity = TlsIdentity::new(vec![], key);

        let established = SecureAdsConfig::self_signed(identity.clone());
        assert_eq!(established.connect_flags(), TlsConnectFlags::SELF_SIGNED);

        let registration = SecureAdsConfig::self_signed_route_registration(
            identity,
            Credentials::new("Administrator", "1"),
        );
        assert!(registration
            .connect_flags()
            .contains(TlsConnectFlags::ADD_REMOTE | TlsConnectFlags::SELF_SIGNED));

        let request = registration.connect_info_request("10.20.30.40.1.1".parse().unwrap());
        assert!(request.credentials.is_some());
    }

    #[test]
    fn test_self_signed_optional_flags() {
        let key = rustls::pki_types::PrivateKeyDer::Pkcs8(
            rustls::pki_types::PrivatePkcs8KeyDer::from(vec![0u8; 16]),
        );
        let config = SecureAdsConfig::SelfSigned {
            identity: TlsIdentity::new(vec![], key),
            credentials: Some(Credentials::new("Administrator", "1")),
            hostname: None,
            use_ip_addr: true,
            ignore_cn: true,
        };

        let flags = config.connect_flags();
        assert_eq!(flags.bits(), 0x00F0);
    }
}
