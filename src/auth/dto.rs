use serde::{Deserialize, Serialize};

use crate::users::repo::Role;

/// Request body for registration. Role may be chosen once here;
/// afterwards it is server-assigned.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// Request body for login. `role` is accepted for client compatibility
/// but never overwrites the stored role.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub redirect_to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_is_camel_case() {
        let resp = LoginResponse {
            token: "t".into(),
            role: Role::Teacher,
            redirect_to: "teacher-dashboard.html".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"redirectTo\":\"teacher-dashboard.html\""));
        assert!(json.contains("\"role\":\"teacher\""));
    }

    #[test]
    fn login_request_accepts_optional_role() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw","role":"teacher"}"#).unwrap();
        assert_eq!(req.role, Some(Role::Teacher));

        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw"}"#).unwrap();
        assert_eq!(req.role, None);
    }
}
