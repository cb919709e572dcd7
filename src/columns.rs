// Header cleanup and canonical column naming.
//
// Every sheet arrives with its own header spellings (trailing spaces,
// missing accents, embedded newlines, "Prof" vs "Enseignant"). Cleaning plus
// a fixed alias table rewrites them to one canonical set; anything not in
// the table passes through unchanged and is simply ignored downstream.
// Supporting a new spelling means adding an entry, not adding logic.
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const COL_MATIERE: &str = "Matière";
pub const COL_VHP: &str = "VHP";
pub const COL_SEMESTRE: &str = "Semestre";
pub const COL_RESPONSABLE: &str = "Responsable";
pub const COL_EMAIL: &str = "Email";
pub const COL_OBSERVATIONS: &str = "Observations";
pub const COL_DEBUT: &str = "Début prévu";
pub const COL_FIN: &str = "Fin prévue";

static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Taux (%)", "Taux_excel"),
        ("Taux", "Taux_excel"),
        ("Ecart", "Écart"),
        ("Vhr", "VHR"),
        ("Vhp", COL_VHP),
        ("Matiere", COL_MATIERE),
        ("Enseignant", COL_RESPONSABLE),
        ("Prof", COL_RESPONSABLE),
        ("Semester", COL_SEMESTRE),
        ("Observation", COL_OBSERVATIONS),
        ("Debut prevu", COL_DEBUT),
        ("Début", COL_DEBUT),
        ("Fin prevue", COL_FIN),
        ("Fin", COL_FIN),
        ("Mail", COL_EMAIL),
        ("E-mail", COL_EMAIL),
        ("Email enseignant", COL_EMAIL),
        ("Email Enseignant", COL_EMAIL),
    ])
});

/// Strip embedded newlines and stray quotes, collapse whitespace runs to a
/// single space, trim.
pub fn clean_colname(raw: &str) -> String {
    let no_junk: String = raw.chars().filter(|c| *c != '"').collect();
    no_junk.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrite one raw header to its canonical name.
pub fn canonical_colname(raw: &str) -> String {
    let cleaned = clean_colname(raw);
    match ALIASES.get(cleaned.as_str()) {
        Some(canon) => (*canon).to_string(),
        None => cleaned,
    }
}

/// Rewrite a whole header row. Order is preserved; unknown headers pass
/// through cleaned but unrenamed.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    raw.iter().map(|h| canonical_colname(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_messy_headers() {
        assert_eq!(clean_colname("  Matière \n"), "Matière");
        assert_eq!(clean_colname("\"Début   prévu\""), "Début prévu");
        assert_eq!(clean_colname("Email\nenseignant"), "Email enseignant");
    }

    #[test]
    fn maps_known_aliases() {
        assert_eq!(canonical_colname("Enseignant"), "Responsable");
        assert_eq!(canonical_colname("Prof "), "Responsable");
        assert_eq!(canonical_colname("Mail"), "Email");
        assert_eq!(canonical_colname("Ecart"), "Écart");
        assert_eq!(canonical_colname("Matiere"), "Matière");
        assert_eq!(canonical_colname("Taux (%)"), "Taux_excel");
    }

    #[test]
    fn unknown_headers_pass_through() {
        assert_eq!(canonical_colname("Code UE"), "Code UE");
        let raw = vec!["Matiere".to_string(), "Code UE".to_string(), "VHP ".to_string()];
        assert_eq!(normalize_headers(&raw), vec!["Matière", "Code UE", "VHP"]);
    }
}
