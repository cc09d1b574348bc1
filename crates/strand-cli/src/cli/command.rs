use anyhow::{bail, Context, Result};
use nostr::{EventId, PublicKey};
use serde_json::{json, Value};
use strand_core::account::Phase;
use strand_core::{ListKind, MutationOutcome, RelayPolicy, RelayUrl, Session};

/// One invocation of the CLI, already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Status,
    Following,
    Muted,
    Follow { pubkey: String },
    Unfollow { pubkey: String },
    Mute { pubkey: String },
    Unmute { pubkey: String },
    Allow { pubkey: String },
    Disallow { pubkey: String },
    AddFilterList { pubkey: String },
    RemoveFilterList { pubkey: String },
    Relays,
    AddRelay { url: String, policy: RelayPolicy },
    RemoveRelay { url: String },
    Like { event_id: String, author: String },
    Emoji { emoji: Option<String> },
}

impl CliCommand {
    /// Commands that only read state still work when no relay answers.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::Status
                | Self::Following
                | Self::Muted
                | Self::Relays
                | Self::Emoji { emoji: None }
        )
    }
}

pub fn parse_pubkey(s: &str) -> Result<PublicKey> {
    PublicKey::parse(s.trim()).with_context(|| format!("Invalid public key: {}", s))
}

pub fn parse_event_id(s: &str) -> Result<EventId> {
    EventId::parse(s.trim()).with_context(|| format!("Invalid event id: {}", s))
}

/// Map `--read-only` / `--write-only` flags to a relay policy.
pub fn relay_policy(read_only: bool, write_only: bool) -> Result<RelayPolicy> {
    match (read_only, write_only) {
        (true, true) => bail!("--read-only and --write-only are mutually exclusive"),
        (true, false) => Ok(RelayPolicy::new(true, false)),
        (false, true) => Ok(RelayPolicy::new(false, true)),
        (false, false) => Ok(RelayPolicy::READ_WRITE),
    }
}

fn outcome(kind: ListKind, outcome: MutationOutcome) -> Value {
    json!({ "list": kind, "outcome": outcome })
}

pub async fn execute(session: &Session, command: CliCommand) -> Result<Value> {
    let account = session.account();
    let value = match command {
        CliCommand::Status => {
            let phases: serde_json::Map<String, Value> = ListKind::ALL
                .iter()
                .map(|kind| (kind.name().to_string(), json!(account.phase(*kind))))
                .collect();
            let loaded = ListKind::ALL
                .iter()
                .filter(|kind| account.phase(**kind) == Phase::Settled)
                .count();
            json!({
                "pubkey": account.public_key().to_hex(),
                "lists": phases,
                "listsLoaded": loaded,
                "following": account.following().len(),
                "muted": account.muted().len(),
                "likes": account.likes().len(),
                "relays": session.relays().relays(),
                "stats": session.relay_stats(),
            })
        }
        CliCommand::Following => {
            let following: Vec<String> = account.following().iter().map(|pk| pk.to_hex()).collect();
            json!(following)
        }
        CliCommand::Muted => json!({
            "muted": account.muted(),
            "allowlist": account.allowlist(),
            "filterlists": account.filterlists(),
        }),
        CliCommand::Follow { pubkey } => {
            outcome(ListKind::Contacts, account.follow(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::Unfollow { pubkey } => {
            outcome(ListKind::Contacts, account.unfollow(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::Mute { pubkey } => {
            outcome(ListKind::Mutes, account.mute(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::Unmute { pubkey } => {
            outcome(ListKind::Mutes, account.unmute(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::Allow { pubkey } => {
            outcome(ListKind::AllowList, account.allow(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::Disallow { pubkey } => {
            outcome(ListKind::AllowList, account.disallow(&parse_pubkey(&pubkey)?).await?)
        }
        CliCommand::AddFilterList { pubkey } => outcome(
            ListKind::FilterList,
            account.add_filter_list(&parse_pubkey(&pubkey)?).await?,
        ),
        CliCommand::RemoveFilterList { pubkey } => outcome(
            ListKind::FilterList,
            account.remove_filter_list(&parse_pubkey(&pubkey)?).await?,
        ),
        CliCommand::Relays => json!({
            "settings": account.relay_settings(),
            "pool": session.relays().relays(),
        }),
        CliCommand::AddRelay { url, policy } => {
            let url = RelayUrl::parse(&url)?;
            outcome(ListKind::RelayList, account.add_relay(url, policy).await?)
        }
        CliCommand::RemoveRelay { url } => {
            let url = RelayUrl::parse(&url)?;
            outcome(ListKind::RelayList, account.remove_relay(&url).await?)
        }
        CliCommand::Like { event_id, author } => {
            let result = account
                .like(&parse_event_id(&event_id)?, &parse_pubkey(&author)?)
                .await?;
            json!({ "outcome": result })
        }
        CliCommand::Emoji { emoji: Some(emoji) } => {
            account.record_emoji(&emoji);
            json!(account.emoji_history())
        }
        CliCommand::Emoji { emoji: None } => json!(account.emoji_history()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::Keys;

    #[test]
    fn test_parse_pubkey_accepts_hex_and_npub() {
        use nostr::nips::nip19::ToBech32;

        let pk = Keys::generate().public_key();
        assert_eq!(parse_pubkey(&pk.to_hex()).unwrap(), pk);
        assert_eq!(parse_pubkey(&pk.to_bech32().unwrap()).unwrap(), pk);
        assert!(parse_pubkey("npub1nope").is_err());
    }

    #[test]
    fn test_relay_policy_flags() {
        assert_eq!(relay_policy(false, false).unwrap(), RelayPolicy::READ_WRITE);
        assert_eq!(relay_policy(true, false).unwrap(), RelayPolicy::new(true, false));
        assert!(relay_policy(true, true).is_err());
    }

    #[test]
    fn test_read_only_commands() {
        assert!(CliCommand::Status.is_read_only());
        assert!(CliCommand::Emoji { emoji: None }.is_read_only());
        assert!(!CliCommand::Emoji {
            emoji: Some("🔥".to_string())
        }
        .is_read_only());
        assert!(!CliCommand::Follow {
            pubkey: String::new()
        }
        .is_read_only());
    }
}
