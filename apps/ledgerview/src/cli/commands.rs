//! # CLI Command Implementations

use super::DomainArg;
use ledgerview::api::{self, AppState};
use ledgerview::source::{Fixture, FixtureStep, LogSource, MemoryLedger};
use ledgerview::{Config, LiveView, ServerConfig};
use ledgerview_core::{
    Address, Domain, Entity, EntityState, Friends, GroupMessages, Groups, MaterializedView,
    Sessions, Uint256, ViewEntry, ViewError,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The entity a view keeps in sight, as given on the command line.
#[derive(Debug, Clone)]
pub enum FocusArg {
    /// An address, group id or session id, depending on the view.
    Id(String),
    /// A registered username. Only the friends view accepts one.
    Username(String),
}

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub verbose: bool,
}

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

fn resolve_account(flag: Option<&str>, fixture: Option<&Fixture>) -> Result<Address, ViewError> {
    match (flag, fixture.and_then(|f| f.viewer.clone())) {
        (Some(raw), _) => Address::parse(raw),
        (None, Some(viewer)) => Ok(viewer),
        (None, None) => Err(ViewError::Config(
            "No account: pass --account or set \"viewer\" in the fixture".to_string(),
        )),
    }
}

fn require_group(group: Option<&str>) -> Result<Uint256, ViewError> {
    let raw = group.ok_or_else(|| {
        ViewError::Config("The messages view needs --group <id>".to_string())
    })?;
    Uint256::parse(raw)
}

fn focus_entity(domain: DomainArg, raw: &str) -> Result<Entity, ViewError> {
    match domain {
        DomainArg::Friends => Address::parse(raw).map(Entity::account),
        DomainArg::Groups => Uint256::parse(raw).map(Entity::group),
        DomainArg::Sessions => Uint256::parse(raw).map(Entity::session),
        DomainArg::Messages => Err(ViewError::Config(
            "--focus is not supported for the messages view".to_string(),
        )),
    }
}

/// Turn a focus argument into an entity. An unregistered username is
/// reported and leaves the view unfocused.
async fn resolve_focus(
    ledger: &MemoryLedger,
    domain: DomainArg,
    focus: Option<&FocusArg>,
) -> Result<Option<Entity>, ViewError> {
    match focus {
        None => Ok(None),
        Some(FocusArg::Id(raw)) => focus_entity(domain, raw).map(Some),
        Some(FocusArg::Username(name)) => {
            if domain != DomainArg::Friends {
                return Err(ViewError::Config(
                    "--focus-username is only supported for the friends view".to_string(),
                ));
            }
            let address = ledger.address_of_username(name).await?;
            if address.is_zero() {
                tracing::warn!(username = %name, "Username is not registered, no focus set");
                return Ok(None);
            }
            tracing::debug!(username = %name, address = %address.short(), "Resolved username");
            Ok(Some(Entity::account(address)))
        }
    }
}

fn load_ledger(fixture: &Fixture) -> Result<Arc<MemoryLedger>, ViewError> {
    let ledger = MemoryLedger::from_fixture(fixture).map_err(ViewError::from)?;
    Ok(Arc::new(ledger))
}

// =============================================================================
// RENDERING
// =============================================================================

fn describe(entry: &ViewEntry, account: &Address) -> String {
    match &entry.state {
        EntityState::Relation { status } => format!("{:?}", status),
        EntityState::Group(info) => format!(
            "\"{}\" created by {} at height {}",
            info.name,
            info.creator.short(),
            info.created_at
        ),
        EntityState::Message(info) => {
            format!("{} from {} at {}", info.cid, info.from.short(), info.ts)
        }
        EntityState::Session(info) => {
            let last = if info.last_cid.is_empty() {
                "no messages"
            } else {
                info.last_cid.as_str()
            };
            format!(
                "with {} since height {}, last: {}",
                info.peer(account).short(),
                info.created_at,
                last
            )
        }
    }
}

fn print_view(view: &MaterializedView, account: &Address, output: Output) {
    let snapshot = view.snapshot();
    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).unwrap_or_default()
        );
        return;
    }

    println!(
        "{} view at height {} ({} entries)",
        snapshot.domain,
        snapshot.height,
        snapshot.total()
    );
    for (bucket, entries) in &snapshot.buckets {
        println!("  {} ({})", bucket.name(), entries.len());
        for entry in entries {
            if output.verbose {
                println!("    {}  {}", entry.entity, describe(entry, account));
            } else {
                println!("    {}", entry.entity);
            }
        }
    }
}

// =============================================================================
// VIEW COMMAND
// =============================================================================

/// Build a ledger from a fixture and print one view.
pub async fn cmd_view(
    config: &Config,
    output: Output,
    fixture_path: &Path,
    account: Option<&str>,
    domain: DomainArg,
    group: Option<&str>,
    focus: Option<&FocusArg>,
) -> Result<(), ViewError> {
    let fixture = Fixture::load(fixture_path)?;
    let account = resolve_account(account, Some(&fixture))?;
    let ledger = load_ledger(&fixture)?;
    let focus = resolve_focus(&ledger, domain, focus).await?;

    match domain {
        DomainArg::Friends => view_once(config, output, ledger, account, Friends, focus).await,
        DomainArg::Groups => view_once(config, output, ledger, account, Groups, focus).await,
        DomainArg::Sessions => view_once(config, output, ledger, account, Sessions, focus).await,
        DomainArg::Messages => {
            let domain = GroupMessages::new(require_group(group)?);
            view_once(config, output, ledger, account, domain, focus).await
        }
    }
}

async fn view_once<D: Domain + 'static>(
    config: &Config,
    output: Output,
    ledger: Arc<MemoryLedger>,
    account: Address,
    domain: D,
    focus: Option<Entity>,
) -> Result<(), ViewError> {
    let view = LiveView::new(ledger, account.clone(), domain, &config.view);
    view.set_focus(focus).await;
    let merged = view.refresh().await?;
    print_view(&merged, &account, output);
    Ok(())
}

// =============================================================================
// SIMULATE COMMAND
// =============================================================================

/// Replay a fixture against an active live view, printing after each step.
///
/// A focused entity is also re-read every `view.poll_interval_ms`.
pub async fn cmd_simulate(
    config: &Config,
    output: Output,
    fixture_path: &Path,
    account: Option<&str>,
    domain: DomainArg,
    group: Option<&str>,
    focus: Option<&FocusArg>,
    delay_ms: u64,
) -> Result<(), ViewError> {
    let fixture = Fixture::load(fixture_path)?;
    let account = resolve_account(account, Some(&fixture))?;
    let ledger = Arc::new(MemoryLedger::new());
    for (username, address) in &fixture.usernames {
        ledger.register_username(username, address.clone());
    }
    let focus = resolve_focus(&ledger, domain, focus).await?;
    let delay = Duration::from_millis(delay_ms);

    match domain {
        DomainArg::Friends => {
            simulate(config, output, &fixture, ledger, account, Friends, focus, delay).await
        }
        DomainArg::Groups => {
            simulate(config, output, &fixture, ledger, account, Groups, focus, delay).await
        }
        DomainArg::Sessions => {
            simulate(config, output, &fixture, ledger, account, Sessions, focus, delay).await
        }
        DomainArg::Messages => {
            let domain = GroupMessages::new(require_group(group)?);
            simulate(config, output, &fixture, ledger, account, domain, focus, delay).await
        }
    }
}

async fn simulate<D: Domain + 'static>(
    config: &Config,
    output: Output,
    fixture: &Fixture,
    ledger: Arc<MemoryLedger>,
    account: Address,
    domain: D,
    focus: Option<Entity>,
    delay: Duration,
) -> Result<(), ViewError> {
    let view = LiveView::new(ledger.clone(), account.clone(), domain, &config.view);
    let focused = focus.is_some();
    view.set_focus(focus).await;
    view.refresh().await?;
    view.activate().await?;
    if focused {
        view.start_polling(config.view.poll_interval());
    }

    for (index, step) in fixture.steps.iter().enumerate() {
        let receipt = match ledger.apply_step(step) {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(step = index, error = %e, "Step reverted");
                continue;
            }
        };

        // Own writes merge optimistically; everyone else's arrive live.
        let own = matches!(step, FixtureStep::Write { actor, .. } if *actor == account);
        if let Some(receipt) = receipt.filter(|_| own) {
            view.apply_optimistic(&receipt).await?;
        }

        tokio::time::sleep(delay).await;
        if !output.json {
            println!();
            println!("step {} (height {})", index + 1, ledger.height());
        }
        print_view(&view.view().await, &account, output);
    }

    view.deactivate().await;
    if let Some(e) = view.last_error() {
        tracing::warn!(error = %e, "Background error during simulation");
    }
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config: &Config,
    server: &ServerConfig,
    fixture_path: Option<&Path>,
    account: Option<&str>,
) -> Result<(), ViewError> {
    let fixture = fixture_path.map(Fixture::load).transpose()?;
    let account = resolve_account(account, fixture.as_ref())?;
    let ledger = match &fixture {
        Some(fixture) => load_ledger(fixture)?,
        None => Arc::new(MemoryLedger::new()),
    };

    println!("Ledgerview server starting...");
    println!("  Account:  {}", account);
    println!("  Address:  {}", server.addr());
    println!("  Height:   {}", ledger.height());
    println!();

    let state = AppState::new(ledger, account, config.view.clone());
    api::run_server(&server.addr(), state).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn named_ledger() -> MemoryLedger {
        let ledger = MemoryLedger::new();
        ledger.register_username("bob", Address::from_low_u64(2));
        ledger
    }

    #[tokio::test]
    async fn username_focus_becomes_an_account() {
        let focus = FocusArg::Username("bob".to_string());
        let entity = resolve_focus(&named_ledger(), DomainArg::Friends, Some(&focus))
            .await
            .expect("lookup");
        assert_eq!(entity, Some(Entity::account(Address::from_low_u64(2))));
    }

    #[tokio::test]
    async fn unregistered_username_sets_no_focus() {
        let focus = FocusArg::Username("carol".to_string());
        let entity = resolve_focus(&named_ledger(), DomainArg::Friends, Some(&focus))
            .await
            .expect("lookup");
        assert_eq!(entity, None);
    }

    #[tokio::test]
    async fn username_focus_needs_the_friends_view() {
        let focus = FocusArg::Username("bob".to_string());
        let err = resolve_focus(&named_ledger(), DomainArg::Groups, Some(&focus))
            .await
            .expect_err("groups");
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[tokio::test]
    async fn session_focus_is_a_session_id() {
        let focus = FocusArg::Id("7".to_string());
        let entity = resolve_focus(&named_ledger(), DomainArg::Sessions, Some(&focus))
            .await
            .expect("parse");
        assert_eq!(entity, Some(Entity::session(Uint256::from(7))));
    }
}
