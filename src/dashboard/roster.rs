//! Detection of sheets that look like a user roster (people to invite).

use serde::Serialize;

const EMAIL_ALIASES: &[&str] = &["email", "correo", "e-mail", "mail"];
const NAME_ALIASES: &[&str] = &["nombre", "name", "usuario", "user"];
const ROLE_ALIASES: &[&str] = &["rol", "role", "cargo", "puesto"];

/// Columns holding each user attribute, in their original spelling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserColumns {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserImport {
    pub suggests: bool,
    pub mapping: Option<UserColumns>,
}

/// Suggests a user import when one column matches an email alias and another a name alias.
/// Aliases are tried in their fixed order; each matches the first column equal to it,
/// ignoring case. The mapping holds the columns in their given spelling.
pub fn detect_user_import<S: AsRef<str>>(columns: &[S]) -> UserImport {
    detect_user_import_keyed(columns, columns)
}

/// Like [`detect_user_import`], matching on `headers` but reporting the column at the
/// same position in `keys`, e.g. the sanitized names that key the records.
pub fn detect_user_import_keyed<S, K>(headers: &[S], keys: &[K]) -> UserImport
where
    S: AsRef<str>,
    K: AsRef<str>,
{
    let lowered: Vec<String> = headers.iter().map(|header| header.as_ref().to_lowercase()).collect();
    let find = |aliases: &[&str]| -> Option<String> {
        aliases.iter().find_map(|alias| {
            lowered
                .iter()
                .position(|column| column == alias)
                .and_then(|index| keys.get(index))
                .map(|key| key.as_ref().to_owned())
        })
    };

    match (find(EMAIL_ALIASES), find(NAME_ALIASES)) {
        (Some(email), Some(name)) => UserImport {
            suggests: true,
            mapping: Some(UserColumns {
                email,
                name,
                role: find(ROLE_ALIASES),
            }),
        },
        _ => UserImport::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roster_with_role() {
        let detected = detect_user_import(&["Nombre", "Email", "Cargo"]);
        assert!(detected.suggests);
        assert_eq!(
            detected.mapping,
            Some(UserColumns {
                email: "Email".to_owned(),
                name: "Nombre".to_owned(),
                role: Some("Cargo".to_owned()),
            })
        );
        assert_eq!(
            serde_json::to_value(detected.mapping.unwrap()).unwrap(),
            json!({"email": "Email", "name": "Nombre", "role": "Cargo"})
        );
    }

    #[test]
    fn role_is_optional() {
        let detected = detect_user_import(&["correo", "usuario", "edad"]);
        let mapping = detected.mapping.unwrap();
        assert_eq!(mapping.role, None);
        assert_eq!(serde_json::to_value(mapping).unwrap(), json!({"email": "correo", "name": "usuario"}));
    }

    #[test]
    fn needs_email_and_name() {
        assert_eq!(detect_user_import(&["nombre", "cargo"]), UserImport::default());
        assert_eq!(detect_user_import(&["email", "rol"]), UserImport::default());
        assert_eq!(detect_user_import::<&str>(&[]), UserImport::default());
    }

    #[test]
    fn alias_order_wins() {
        // "email" precedes "mail" in the alias order even though "mail" comes first as a column
        let detected = detect_user_import(&["mail", "user", "email", "name"]);
        let mapping = detected.mapping.unwrap();
        assert_eq!(mapping.email, "email");
        assert_eq!(mapping.name, "name");
    }

    #[test]
    fn hyphenated_alias() {
        let detected = detect_user_import(&["E-Mail", "Name"]);
        assert_eq!(detected.mapping.unwrap().email, "E-Mail");
    }

    #[test]
    fn keyed_mapping_reports_keys() {
        let headers = ["Nombre", "E-mail", "Cargo"];
        let keys = ["nombre", "email", "cargo"];
        let mapping = detect_user_import_keyed(&headers, &keys).mapping.unwrap();
        assert_eq!(
            mapping,
            UserColumns {
                email: "email".to_owned(),
                name: "nombre".to_owned(),
                role: Some("cargo".to_owned()),
            }
        );
    }
}
