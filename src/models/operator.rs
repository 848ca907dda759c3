//! Desk operators and their JWT claims

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Kind of desk account a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatorType {
    /// Human resources: approves visits, sees who is inside, forces checkouts
    Hr,
    /// Front desk: registers visitors and prints cards
    Registration,
    /// Head of security: approves visits
    Hos,
}

/// JWT claims for desk operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    pub sub: String,
    pub user_id: i32,
    pub email: Option<String>,
    pub operator_type: OperatorType,
    pub exp: i64,
    pub iat: i64,
}

impl OperatorClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_hr(&self) -> Result<(), AppError> {
        if self.operator_type == OperatorType::Hr {
            Ok(())
        } else {
            Err(AppError::Authorization("HR access required".to_string()))
        }
    }

    /// HR or head of security
    pub fn require_approver(&self) -> Result<(), AppError> {
        match self.operator_type {
            OperatorType::Hr | OperatorType::Hos => Ok(()),
            OperatorType::Registration => Err(AppError::Authorization(
                "Approver access required".to_string(),
            )),
        }
    }

    /// Registration desk or HR
    pub fn require_registration(&self) -> Result<(), AppError> {
        match self.operator_type {
            OperatorType::Hr | OperatorType::Registration => Ok(()),
            OperatorType::Hos => Err(AppError::Authorization(
                "Registration access required".to_string(),
            )),
        }
    }
}
