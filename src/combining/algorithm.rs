use super::verdict::PolicyOutcome;
use crate::decision::{AuthorizationDecision, Decision};

/// The six rule-combining semantics of §4.4.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CombiningAlgorithm {
	DenyOverrides,
	PermitOverrides,
	FirstApplicable,
	OnlyOneApplicable,
	DenyUnlessPermit,
	PermitUnlessDeny,
}

impl CombiningAlgorithm {
	pub fn name(&self) -> &'static str {
		match self {
			CombiningAlgorithm::DenyOverrides => "deny-overrides",
			CombiningAlgorithm::PermitOverrides => "permit-overrides",
			CombiningAlgorithm::FirstApplicable => "first-applicable",
			CombiningAlgorithm::OnlyOneApplicable => "only-one-applicable",
			CombiningAlgorithm::DenyUnlessPermit => "deny-unless-permit",
			CombiningAlgorithm::PermitUnlessDeny => "permit-unless-deny",
		}
	}
}

/// Aggregates per-policy outcomes into one document-set decision, per §4.4's
/// transformation-uncertainty and constraint-merging rules.
pub fn combine(algorithm: CombiningAlgorithm, outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	match algorithm {
		CombiningAlgorithm::DenyOverrides => deny_overrides(outcomes),
		CombiningAlgorithm::PermitOverrides => permit_overrides(outcomes),
		CombiningAlgorithm::FirstApplicable => first_applicable(outcomes),
		CombiningAlgorithm::OnlyOneApplicable => only_one_applicable(outcomes),
		CombiningAlgorithm::DenyUnlessPermit => deny_unless_permit(outcomes),
		CombiningAlgorithm::PermitUnlessDeny => permit_unless_deny(outcomes),
	}
}

fn of_decision<'a>(outcomes: &'a [PolicyOutcome], decision: Decision) -> Vec<&'a PolicyOutcome> {
	outcomes.iter().filter(|o| o.decision == decision).collect()
}

fn xform_count(outcomes: &[&PolicyOutcome]) -> usize {
	outcomes.iter().filter(|o| o.resource.is_some()).count()
}

fn first_resource(outcomes: &[&PolicyOutcome]) -> Option<crate::value::Value> {
	outcomes.iter().find_map(|o| o.resource.clone())
}

/// Merges obligations/advice from every outcome in `winning` and attaches
/// `resource`, per §4.4's constraint-merging rule.
fn merged(decision: Decision, winning: &[&PolicyOutcome], resource: Option<crate::value::Value>) -> AuthorizationDecision {
	let mut obligations = Vec::new();
	let mut advice = Vec::new();
	for o in winning {
		obligations.extend(o.obligations.iter().cloned());
		advice.extend(o.advice.iter().cloned());
	}
	AuthorizationDecision { decision, obligations, advice, resource }
}

fn deny_overrides(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	let denies = of_decision(outcomes, Decision::Deny);
	if !denies.is_empty() {
		return merged(Decision::Deny, &denies, first_resource(&denies));
	}
	if outcomes.iter().any(|o| o.decision == Decision::Indeterminate) {
		return AuthorizationDecision::indeterminate();
	}
	let permits = of_decision(outcomes, Decision::Permit);
	if !permits.is_empty() {
		if xform_count(&permits) >= 2 {
			debug!("deny-overrides: {} permit policies disagree on a transformed resource, declaring indeterminate", xform_count(&permits));
			return AuthorizationDecision::indeterminate();
		}
		return merged(Decision::Permit, &permits, first_resource(&permits));
	}
	AuthorizationDecision::not_applicable()
}

fn permit_overrides(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	let permits = of_decision(outcomes, Decision::Permit);
	let denies = of_decision(outcomes, Decision::Deny);
	if !permits.is_empty() {
		if xform_count(&permits) >= 2 || !denies.is_empty() && xform_count(&denies) >= 1 {
			debug!("permit-overrides: transformed resource is ambiguous between winning and losing policies, declaring indeterminate");
			return AuthorizationDecision::indeterminate();
		}
		return merged(Decision::Permit, &permits, first_resource(&permits));
	}
	if !denies.is_empty() {
		if xform_count(&denies) >= 2 {
			debug!("permit-overrides: {} deny policies disagree on a transformed resource, declaring indeterminate", xform_count(&denies));
			return AuthorizationDecision::indeterminate();
		}
		return merged(Decision::Deny, &denies, first_resource(&denies));
	}
	if outcomes.iter().any(|o| o.decision == Decision::Indeterminate) {
		return AuthorizationDecision::indeterminate();
	}
	AuthorizationDecision::not_applicable()
}

fn first_applicable(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	for o in outcomes {
		match o.decision {
			Decision::NotApplicable => continue,
			Decision::Indeterminate => return AuthorizationDecision::indeterminate(),
			Decision::Permit | Decision::Deny => return merged(o.decision, &[o], o.resource.clone()),
		}
	}
	AuthorizationDecision::not_applicable()
}

/// Per §9's Open Question decision: an indeterminate policy counts as
/// applicable for the uniqueness check, so it competes with genuine
/// permits/denies for the "only one" slot.
fn only_one_applicable(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	let applicable: Vec<&PolicyOutcome> = outcomes.iter().filter(|o| o.decision != Decision::NotApplicable).collect();
	match applicable.as_slice() {
		[] => AuthorizationDecision::not_applicable(),
		[single] if single.decision != Decision::Indeterminate => merged(single.decision, &[single], single.resource.clone()),
		[_single] => AuthorizationDecision::indeterminate(),
		_ => {
			debug!("only-one-applicable: {} policies are applicable, declaring indeterminate", applicable.len());
			AuthorizationDecision::indeterminate()
		}
	}
}

fn deny_unless_permit(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	let permits = of_decision(outcomes, Decision::Permit);
	if permits.is_empty() {
		return AuthorizationDecision::new(Decision::Deny);
	}
	if xform_count(&permits) >= 2 {
		debug!("deny-unless-permit: permit policies disagree on a transformed resource, failing safe to deny");
		return AuthorizationDecision::new(Decision::Deny);
	}
	merged(Decision::Permit, &permits, first_resource(&permits))
}

fn permit_unless_deny(outcomes: &[PolicyOutcome]) -> AuthorizationDecision {
	let denies = of_decision(outcomes, Decision::Deny);
	if denies.is_empty() {
		return AuthorizationDecision::new(Decision::Permit);
	}
	merged(Decision::Deny, &denies, first_resource(&denies))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn outcome(name: &str, decision: Decision, resource: Option<crate::value::Value>) -> PolicyOutcome {
		PolicyOutcome { name: name.into(), decision, obligations: Vec::new(), advice: Vec::new(), resource }
	}

	#[test]
	fn deny_overrides_two_permit_transforms_is_indeterminate() {
		let outcomes = vec![
			outcome("p1", Decision::Permit, Some(crate::value::Value::text("resource1"))),
			outcome("p2", Decision::Permit, Some(crate::value::Value::text("resource2"))),
		];
		let result = combine(CombiningAlgorithm::DenyOverrides, &outcomes);
		assert_eq!(result.decision, Decision::Indeterminate);
	}

	#[test]
	fn permit_overrides_two_deny_transforms_is_indeterminate() {
		let outcomes = vec![
			outcome("p1", Decision::Deny, Some(crate::value::Value::object_literal(vec![("source".into(), crate::value::Value::text("d1"))]))),
			outcome("p2", Decision::Deny, Some(crate::value::Value::object_literal(vec![("source".into(), crate::value::Value::text("d2"))]))),
		];
		let result = combine(CombiningAlgorithm::PermitOverrides, &outcomes);
		assert_eq!(result.decision, Decision::Indeterminate);
	}

	#[test]
	fn first_applicable_skips_not_applicable_and_keeps_only_first_obligations() {
		let outcomes = vec![
			outcome("na", Decision::NotApplicable, None),
			PolicyOutcome {
				name: "first".into(),
				decision: Decision::Permit,
				obligations: vec![crate::value::Value::object_literal(vec![("type".into(), crate::value::Value::text("o1"))])],
				advice: Vec::new(),
				resource: None,
			},
			PolicyOutcome {
				name: "second".into(),
				decision: Decision::Permit,
				obligations: vec![crate::value::Value::object_literal(vec![("type".into(), crate::value::Value::text("o2"))])],
				advice: Vec::new(),
				resource: None,
			},
		];
		let result = combine(CombiningAlgorithm::FirstApplicable, &outcomes);
		assert_eq!(result.decision, Decision::Permit);
		assert_eq!(result.obligations.len(), 1);
	}

	#[test]
	fn only_one_applicable_two_applicable_is_indeterminate() {
		let outcomes = vec![outcome("a", Decision::Permit, None), outcome("b", Decision::Deny, None)];
		let result = combine(CombiningAlgorithm::OnlyOneApplicable, &outcomes);
		assert_eq!(result.decision, Decision::Indeterminate);
	}

	#[test]
	fn only_one_applicable_indeterminate_alone_stays_indeterminate() {
		let outcomes = vec![outcome("a", Decision::Indeterminate, None), outcome("b", Decision::NotApplicable, None)];
		let result = combine(CombiningAlgorithm::OnlyOneApplicable, &outcomes);
		assert_eq!(result.decision, Decision::Indeterminate);
	}

	#[test]
	fn deny_unless_permit_defaults_to_deny_with_no_constraints() {
		let outcomes = vec![outcome("a", Decision::Indeterminate, None), outcome("b", Decision::NotApplicable, None)];
		let result = combine(CombiningAlgorithm::DenyUnlessPermit, &outcomes);
		assert_eq!(result.decision, Decision::Deny);
		assert!(result.obligations.is_empty());
	}

	#[test]
	fn permit_unless_deny_defaults_to_permit_with_no_constraints() {
		let outcomes = vec![outcome("a", Decision::NotApplicable, None)];
		let result = combine(CombiningAlgorithm::PermitUnlessDeny, &outcomes);
		assert_eq!(result.decision, Decision::Permit);
		assert!(result.obligations.is_empty());
	}
}
