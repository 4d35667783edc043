//! Heuristic classifiers and input sanitization
//!
//! Pure functions with no I/O. Rules are checked in a fixed order and the
//! first match wins.

use crate::domain::company::{Franchise, FranchiseSignal, Territory, TerritorySignal};

/// Maximum query length in characters
pub const MAX_QUERY_CHARS: usize = 140;

/// Trim and cap a company name query.
///
/// Whitespace-only input yields an empty string; callers reject it.
pub fn safe_query(input: &str) -> String {
    let capped: String = input.trim().chars().take(MAX_QUERY_CHARS).collect();
    // Truncation can expose whitespace that sat in the middle of the input
    capped.trim_end().to_string()
}

/// Classify an address against the configured sales-territory keyword
pub fn infer_territory(address: Option<&str>, keyword: Option<&str>) -> TerritorySignal {
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
    let Some(keyword) = keyword else {
        return TerritorySignal::new(Territory::Unknown, "No territory configured.");
    };
    let address = address.map(str::trim).filter(|a| !a.is_empty());
    let Some(address) = address else {
        return TerritorySignal::new(Territory::Unknown, "Address not available.");
    };

    if address.to_lowercase().contains(&keyword.to_lowercase()) {
        TerritorySignal::new(Territory::Inside, format!("Address contains {keyword}."))
    } else {
        TerritorySignal::new(Territory::Outside, format!("Address missing {keyword}."))
    }
}

/// Classify franchise likelihood from free-text entity type and branch status
pub fn infer_franchise(entity_type: Option<&str>, branch_status: Option<&str>) -> FranchiseSignal {
    let entity_type = entity_type.unwrap_or_default().to_lowercase();
    let branch_status = branch_status.unwrap_or_default().to_lowercase();

    if entity_type.contains("franchise") {
        return FranchiseSignal::new(Franchise::Yes, "Company type mentions franchise.");
    }
    if branch_status.contains("branch") {
        return FranchiseSignal::new(Franchise::Likely, "Listed as a branch entity.");
    }
    FranchiseSignal::new(Franchise::Unknown, "Franchise data not provided.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_query_trims_and_caps() {
        let input = format!("  Example Pty Ltd {}", "x".repeat(200));
        let result = safe_query(&input);
        assert!(result.starts_with("Example Pty Ltd"));
        assert!(result.chars().count() <= MAX_QUERY_CHARS);
    }

    #[test]
    fn test_safe_query_blank_is_empty() {
        assert_eq!(safe_query(""), "");
        assert_eq!(safe_query("   \t\n "), "");
    }

    #[test]
    fn test_safe_query_never_ends_with_whitespace_after_cap() {
        let input = format!("{} tail", "a".repeat(MAX_QUERY_CHARS - 1));
        let result = safe_query(&input);
        assert_eq!(result, "a".repeat(MAX_QUERY_CHARS - 1));
    }

    #[test]
    fn test_safe_query_counts_characters_not_bytes() {
        let input = "é".repeat(200);
        let result = safe_query(&input);
        assert_eq!(result.chars().count(), MAX_QUERY_CHARS);
    }

    #[test]
    fn test_territory_inside_and_outside() {
        let inside = infer_territory(Some("123 Main St, Sydney NSW Australia"), Some("Australia"));
        assert_eq!(inside.status, Territory::Inside);
        assert_eq!(inside.reason, "Address contains Australia.");

        let outside = infer_territory(Some("123 Main St, Auckland NZ"), Some("Australia"));
        assert_eq!(outside.status, Territory::Outside);
        assert_eq!(outside.reason, "Address missing Australia.");
    }

    #[test]
    fn test_territory_is_case_insensitive() {
        let hit = infer_territory(Some("1 QUEEN ST BRISBANE AUSTRALIA"), Some("australia"));
        assert_eq!(hit.status, Territory::Inside);
    }

    #[test]
    fn test_territory_unknown_without_inputs() {
        let no_keyword = infer_territory(Some("Sydney"), Some(""));
        assert_eq!(no_keyword.status, Territory::Unknown);
        assert_eq!(no_keyword.reason, "No territory configured.");

        let no_address = infer_territory(Some(""), Some("Australia"));
        assert_eq!(no_address.status, Territory::Unknown);
        assert_eq!(no_address.reason, "Address not available.");

        assert_eq!(infer_territory(None, None).status, Territory::Unknown);
    }

    #[test]
    fn test_franchise_keyword_wins_over_branch() {
        let res = infer_franchise(Some("Franchise Pty Ltd"), Some("Branch"));
        assert_eq!(res.value, Franchise::Yes);
    }

    #[test]
    fn test_franchise_branch_is_likely() {
        let res = infer_franchise(Some("Private Company"), Some("Branch of foreign company"));
        assert_eq!(res.value, Franchise::Likely);
        assert_eq!(res.reason, "Listed as a branch entity.");
    }

    #[test]
    fn test_franchise_unknown_by_default() {
        assert_eq!(infer_franchise(None, None).value, Franchise::Unknown);
        assert_eq!(infer_franchise(Some("Proprietary"), Some("")).value, Franchise::Unknown);
    }
}
