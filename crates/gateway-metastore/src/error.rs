//! Postgres driver-error mapping (§4.3): translates `sqlx::Error` into the
//! gateway-wide error taxonomy by inspecting the driver's SQLSTATE code.

use gateway_common::Error;

/// `42501→AccessDenied`, `23505→ResourceAlreadyExists`,
/// `23503→`(invalid parameter, no dedicated variant exists upstream),
/// `55P03→ResourceLocked`, `57014→DatabaseTimeout`.
pub fn map_sqlx_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if let Some(code) = db_err.code() {
            return match code.as_ref() {
                "42501" => Error::AccessDenied,
                "23505" => Error::ResourceAlreadyExists(db_err.message().to_string()),
                "23503" => Error::invalid_parameter(format!(
                    "related resource not found: {}",
                    db_err.message()
                )),
                "55P03" => Error::ResourceLocked(db_err.message().to_string()),
                "57014" => Error::DatabaseTimeout,
                _ => Error::DatabaseError(db_err.message().to_string()),
            };
        }
    }

    match err {
        sqlx::Error::RowNotFound => Error::NoSuchKey {
            bucket: String::new(),
            key: String::new(),
        },
        other => Error::DatabaseError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_no_such_key() {
        let mapped = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(mapped, Error::NoSuchKey { .. }));
    }
}
