/// Build a SOQL query from its parts.
///
/// The filter is appended verbatim after the object name, so it carries its
/// own `WHERE`/`LIMIT` keywords. An empty filter leaves a trailing space.
pub fn build_query(s_object_type: &str, fields: &[String], filter: &str) -> String {
    format!("SELECT {} FROM {} {}", fields.join(","), s_object_type, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_fields_without_spaces() {
        let fields = vec!["Id".to_string(), "Name".to_string(), "External_Id__c".to_string()];
        assert_eq!(
            build_query("Account", &fields, "WHERE IsDeleted = false LIMIT 10"),
            "SELECT Id,Name,External_Id__c FROM Account WHERE IsDeleted = false LIMIT 10"
        );
    }

    #[test]
    fn empty_filter_keeps_trailing_space() {
        assert_eq!(build_query("Contact", &["Id".to_string()], ""), "SELECT Id FROM Contact ");
    }
}
