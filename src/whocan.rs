//! The Who-Can driver: fans (principal, action) work items across a rayon
//! pool and collects the allowed tuples.

use {
    crate::{
        catalog::ActionCatalog,
        identity::list_principals,
        sim::{SimulationRequest, Simulator},
        store::SnapshotStore,
        LensError,
    },
    rayon::prelude::*,
    serde::Serialize,
};

/// The query: a resource, or an account plus explicit actions.
#[derive(Clone, Debug, Default)]
pub struct WhoCanRequest {
    pub resource: Option<String>,
    pub resource_account: Option<String>,
    pub actions: Vec<String>,
}

/// One (principal, action, resource) tuple the simulation allowed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AllowedResult {
    pub principal: String,
    pub action: String,
    pub resource: String,
}

/// Enumerate the principals of every known account and simulate each
/// candidate action. Work items run in parallel on the global pool (bounded
/// at CPU count; the calling thread participates); the result is stably
/// sorted by (principal, action).
pub fn who_can(
    store: &dyn SnapshotStore,
    catalog: &dyn ActionCatalog,
    simulator: &dyn Simulator,
    request: &WhoCanRequest,
) -> Result<Vec<AllowedResult>, LensError> {
    let resource = request.resource.clone().unwrap_or_else(|| "*".to_string());

    let actions = if request.actions.is_empty() {
        candidate_actions(catalog, &resource)?
    } else {
        request.actions.clone()
    };

    let mut principals = Vec::new();
    for account_id in store.accounts()? {
        principals.extend(list_principals(store, &account_id)?);
    }

    let mut work = Vec::with_capacity(principals.len() * actions.len());
    for principal in &principals {
        for action in &actions {
            work.push((principal.clone(), action.clone()));
        }
    }
    log::debug!("who-can: {} principals x {} actions", principals.len(), actions.len());

    let results: Result<Vec<Option<AllowedResult>>, LensError> = work
        .par_iter()
        .map(|(principal, action)| {
            let mut builder = SimulationRequest::builder();
            builder.principal(principal.clone()).action(action.clone()).resource(resource.clone());
            if let Some(account) = &request.resource_account {
                builder.resource_account(account.clone());
            }
            let simulation =
                builder.build().map_err(|e| LensError::Store(format!("simulation request: {}", e)))?;

            let outcome = simulator.simulate(&simulation)?;
            Ok(outcome.is_allowed().then(|| AllowedResult {
                principal: principal.clone(),
                action: action.clone(),
                resource: resource.clone(),
            }))
        })
        .collect();

    let mut out: Vec<AllowedResult> = results?.into_iter().flatten().collect();
    out.sort_by(|a, b| (&a.principal, &a.action).cmp(&(&b.principal, &b.action)));
    Ok(out)
}

/// Without explicit actions, every catalog action of the resource's service
/// is a candidate.
fn candidate_actions(catalog: &dyn ActionCatalog, resource: &str) -> Result<Vec<String>, LensError> {
    let service = resource
        .splitn(6, ':')
        .nth(2)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LensError::InvalidAction(format!("cannot derive actions for resource {}", resource)))?;

    Ok(catalog
        .service_actions(service)
        .into_iter()
        .map(|spec| format!("{}:{}", service, spec.name))
        .collect())
}
