//! Traffic expressions referencing gateway lists

/// Field a traffic expression matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficField {
    /// Queried DNS names
    DnsDomains,
    /// TLS server name indication
    SniDomains,
}

impl TrafficField {
    /// Field name in the expression language
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficField::DnsDomains => "dns.domains",
            TrafficField::SniDomains => "net.sni.domains",
        }
    }
}

/// Build `any(<field>[*] in $<id>) or ...` over `list_ids`, order preserved
///
/// Returns `None` for an empty slice.
pub fn build_traffic_expression(list_ids: &[String], field: TrafficField) -> Option<String> {
    if list_ids.is_empty() {
        return None;
    }

    let field = field.as_str();
    let clauses: Vec<String> = list_ids
        .iter()
        .map(|id| format!("any({}[*] in ${})", field, id))
        .collect();

    Some(clauses.join(" or "))
}
