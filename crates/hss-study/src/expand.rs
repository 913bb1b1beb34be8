//! Contingency expander: (base case × contingency × filter tap) fan-out.
//!
//! Produces every candidate [`CaseVariant`] for a study with deterministic
//! ids and verifies id uniqueness before returning. Element resolution goes
//! through the [`ElementResolver`] seam so expansion can be tested without a
//! live engine; a contingency whose actions all fail to resolve is skipped
//! for that base case, never silently treated as "Intact".

use hss_core::{Diagnostics, HssError, HssResult};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::case::{BaseCase, CaseVariant, Contingency, FilterApplication, FilterVariant};

/// Resolution seam against the live model held by the external engine.
pub trait ElementResolver {
    /// True when `element` exists in the network `network_reference` points at.
    fn can_resolve(&self, network_reference: &str, element: &str) -> bool;
}

/// Resolver that accepts every element; useful for dry-run expansion.
pub struct ResolveAll;

impl ElementResolver for ResolveAll {
    fn can_resolve(&self, _network_reference: &str, _element: &str) -> bool {
        true
    }
}

/// Outcome of case expansion.
#[derive(Debug)]
pub struct Expansion {
    /// All candidate variants, Intact-first within each base case.
    pub variants: Vec<CaseVariant>,
    /// `(base_case, contingency)` pairs dropped for lack of resolvable actions.
    pub skipped: Vec<(String, String)>,
    pub diagnostics: Diagnostics,
}

/// Expand base cases against contingencies and filter taps.
///
/// Ordering: for each base case, the Intact variant(s) come first, then one
/// variant per resolvable contingency, each multiplied by every enabled
/// filter tap when filters are present. A collision between two computed
/// variant ids is a hard error.
pub fn expand(
    base_cases: &[BaseCase],
    contingencies: &[Contingency],
    filters: &[FilterVariant],
    resolver: &dyn ElementResolver,
) -> HssResult<Expansion> {
    let applications = filter_applications(filters);
    let mut variants = Vec::new();
    let mut skipped = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for base_case in base_cases {
        push_variants(&mut variants, base_case, Contingency::intact(), &applications);

        for contingency in contingencies {
            let resolvable: Vec<_> = contingency
                .actions
                .iter()
                .filter(|action| {
                    let ok = resolver.can_resolve(&base_case.network_reference, action.element());
                    if !ok {
                        diagnostics.add_warning_with_entity(
                            "config",
                            &format!(
                                "element '{}' not found in '{}'",
                                action.element(),
                                base_case.network_reference
                            ),
                            &contingency.name,
                        );
                    }
                    ok
                })
                .cloned()
                .collect();

            if resolvable.is_empty() {
                diagnostics.add_warning_with_entity(
                    "config",
                    &format!(
                        "no resolvable actions for base case '{}'; contingency skipped",
                        base_case.name
                    ),
                    &contingency.name,
                );
                skipped.push((base_case.name.clone(), contingency.name.clone()));
                continue;
            }

            let effective = Contingency {
                name: contingency.name.clone(),
                actions: resolvable,
            };
            push_variants(&mut variants, base_case, effective, &applications);
        }
    }

    verify_unique_ids(&variants)?;
    info!(
        variants = variants.len(),
        skipped = skipped.len(),
        "expanded case variants"
    );
    Ok(Expansion {
        variants,
        skipped,
        diagnostics,
    })
}

fn filter_applications(filters: &[FilterVariant]) -> Vec<FilterApplication> {
    filters
        .iter()
        .flat_map(|filter| {
            filter.taps.iter().map(|tap| FilterApplication {
                filter_name: filter.name.clone(),
                tap: *tap,
            })
        })
        .collect()
}

fn push_variants(
    variants: &mut Vec<CaseVariant>,
    base_case: &BaseCase,
    contingency: Contingency,
    applications: &[FilterApplication],
) {
    if applications.is_empty() {
        variants.push(CaseVariant::new(base_case, contingency, None));
        return;
    }
    for application in applications {
        debug!(
            base_case = %base_case.name,
            contingency = %contingency.name,
            filter = %application.label(),
            "expanding variant"
        );
        variants.push(CaseVariant::new(
            base_case,
            contingency.clone(),
            Some(application.clone()),
        ));
    }
}

fn verify_unique_ids(variants: &[CaseVariant]) -> HssResult<()> {
    let mut seen = HashSet::with_capacity(variants.len());
    for variant in variants {
        if !seen.insert(variant.id.as_str()) {
            return Err(HssError::Config(format!(
                "variant id collision: '{}'",
                variant.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{ElementAction, FilterTap};

    fn base(name: &str) -> BaseCase {
        BaseCase {
            name: name.into(),
            network_reference: "grid/main".into(),
            load_flow_config: None,
            scan_config: None,
        }
    }

    fn outage(name: &str, element: &str) -> Contingency {
        Contingency {
            name: name.into(),
            actions: vec![ElementAction::Outage {
                element: element.into(),
            }],
        }
    }

    struct DenyList(Vec<String>);

    impl ElementResolver for DenyList {
        fn can_resolve(&self, _network: &str, element: &str) -> bool {
            !self.0.iter().any(|denied| denied == element)
        }
    }

    #[test]
    fn intact_is_always_first() {
        let expansion = expand(
            &[base("BASE")],
            &[outage("Line_Out", "line/L1")],
            &[],
            &ResolveAll,
        )
        .unwrap();
        assert_eq!(expansion.variants.len(), 2);
        assert!(expansion.variants[0].is_intact());
        assert_eq!(expansion.variants[1].id, "BASE_Line_Out");
    }

    #[test]
    fn variant_count_matches_expansion_formula() {
        // |base| * (1 + |contingencies|) * |taps| = 2 * 3 * 4
        let filters = vec![FilterVariant {
            name: "C5".into(),
            target_element: "bus/PCC".into(),
            taps: vec![
                FilterTap { tuning_frequency_hz: 245.0, size_mvar: 20.0 },
                FilterTap { tuning_frequency_hz: 245.0, size_mvar: 25.0 },
                FilterTap { tuning_frequency_hz: 250.0, size_mvar: 20.0 },
                FilterTap { tuning_frequency_hz: 250.0, size_mvar: 25.0 },
            ],
        }];
        let expansion = expand(
            &[base("A"), base("B")],
            &[outage("C1", "line/L1"), outage("C2", "line/L2")],
            &filters,
            &ResolveAll,
        )
        .unwrap();
        assert_eq!(expansion.variants.len(), 24);
        let ids: HashSet<_> = expansion.variants.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids.len(), 24);
    }

    #[test]
    fn unresolvable_contingency_is_skipped_not_intact() {
        let resolver = DenyList(vec!["line/GONE".into()]);
        let expansion = expand(
            &[base("BASE")],
            &[outage("Ghost", "line/GONE"), outage("Real", "line/L1")],
            &[],
            &resolver,
        )
        .unwrap();
        let ids: Vec<_> = expansion.variants.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["BASE_Intact", "BASE_Real"]);
        assert_eq!(expansion.skipped, vec![("BASE".to_string(), "Ghost".to_string())]);
        assert!(expansion.diagnostics.has_issues());
    }

    #[test]
    fn partially_resolvable_contingency_keeps_resolved_actions() {
        let resolver = DenyList(vec!["line/GONE".into()]);
        let contingency = Contingency {
            name: "Mixed".into(),
            actions: vec![
                ElementAction::Outage { element: "line/GONE".into() },
                ElementAction::Outage { element: "line/L1".into() },
            ],
        };
        let expansion = expand(&[base("BASE")], &[contingency], &[], &resolver).unwrap();
        assert_eq!(expansion.variants.len(), 2);
        assert_eq!(expansion.variants[1].contingency.actions.len(), 1);
        assert_eq!(expansion.diagnostics.warning_count(), 1);
    }

    #[test]
    fn id_collision_is_a_hard_error() {
        // Underscore naming makes BASE + X_Y collide with BASE_X + Y
        let result = expand(
            &[base("BASE"), base("BASE_Line")],
            &[outage("Line_Out", "l"), outage("Out", "l")],
            &[],
            &ResolveAll,
        );
        assert!(matches!(result, Err(HssError::Config(_))));
    }
}
