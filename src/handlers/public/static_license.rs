use serde::{Deserialize, Serialize};

use crate::catalog::static_license_keys;
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Query};
use crate::models::validate_email_format;

#[derive(Debug, Deserialize)]
pub struct StaticLicenseQuery {
    pub email: String,
    pub product: String,
}

#[derive(Debug, Serialize)]
pub struct StaticLicenseResponse {
    pub email: String,
    pub product: String,
    pub license_keys: Vec<&'static str>,
}

/// GET /static-license?email=&product=
pub async fn get_static_license(
    Query(query): Query<StaticLicenseQuery>,
) -> Result<Json<StaticLicenseResponse>> {
    validate_email_format(&query.email)?;

    let keys = static_license_keys(&query.product)
        .ok_or_else(|| AppError::NotFound(msg::PRODUCT_NOT_RECOGNIZED.into()))?;

    Ok(Json(StaticLicenseResponse {
        email: query.email.trim().to_string(),
        product: query.product,
        license_keys: keys.to_vec(),
    }))
}
