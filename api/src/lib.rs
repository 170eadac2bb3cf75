//! Front-office API gateway client (component C3): fetch submissions, patch
//! judge results, authenticated with an internal JWT.
//!
//! Grounded on `examples/original_source/treadmill/tasks/ops/api.py`'s
//! `FetchSubmissionOp`/`UpdateJudgeResultOp` and on the teacher's
//! `driver/src/restful/pipeline.rs` chain-of-responsibility wrapper over
//! `reqwest`. Consumes the three endpoints named by spec.md §6: `GET
//! /problems/{pid}/submissions/{sid}/detail`, `PATCH /judge/{rid}/`,
//! `PATCH /judge/{rid}/testset/{sid}/`, `PATCH
//! /judge/{rid}/testset/{sid}/testcase/{cid}/`.

#[macro_use]
extern crate error_chain;

use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use tm_model::{JudgeResult, Submission, TestCaseJudgeResult, TestSetJudgeResult};

error_chain! {
    foreign_links {
        Http(reqwest::Error);
        Jwt(jsonwebtoken::errors::Error);
    }

    errors {
        /// Non-OK response or transport failure. Retryable at the worker
        /// layer (spec.md §7: "InternalApiError... Marked retryable").
        InternalApiError(status: Option<StatusCode>) {
            description("front-office API unreachable or returned an error")
            display("front-office API error: {:?}", status)
        }
    }
}

#[derive(Serialize)]
struct JwtClaims {
    internal: &'static str,
    exp: i64,
}

/// Client for the front-office API, authenticated with an internal JWT
/// minted from `TM_API_SECRET_KEY`.
///
/// `Clone`-able and safe for concurrent use across judge requests (spec.md
/// §5: "the API session... must be safe for concurrent use"); `reqwest`'s
/// `Client` is internally pooled and `Arc`-backed.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Mint a long-lived internal token (`exp` far in the future, matching
    /// spec.md §6's `{"internal":"treadmill","exp":+∞}`) signed with
    /// `secret_key`.
    pub fn new(base_url: impl Into<String>, secret_key: &str) -> Result<Self> {
        let claims = JwtClaims {
            internal: "treadmill",
            exp: Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap().timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret_key.as_bytes()),
        )?;

        Ok(ApiClient {
            http: Client::new(),
            base_url: base_url.into(),
            token,
        })
    }

    fn auth_header(&self) -> String {
        format!("JWT {}", self.token)
    }

    /// `GET /problems/{problem_id}/submissions/{submission_id}/detail`.
    pub async fn get_submission(&self, problem_id: i64, submission_id: i64) -> Result<Submission> {
        let url = format!(
            "{}/problems/{}/submissions/{}/detail",
            self.base_url, problem_id, submission_id
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|_| Error::from(ErrorKind::InternalApiError(None)))?;

        self.check_ok(&resp)?;
        resp.json().await.map_err(Into::into)
    }

    /// `PATCH /judge/{request_id}/` — overall result.
    pub async fn set_judge_result(&self, request_id: i64, result: &JudgeResult) -> Result<()> {
        let url = format!("{}/judge/{}/", self.base_url, request_id);
        self.patch(&url, result).await
    }

    /// `PATCH /judge/{request_id}/testset/{testset_id}/`.
    pub async fn set_testset_judge_result(
        &self,
        request_id: i64,
        testset_id: i64,
        result: &TestSetJudgeResult,
    ) -> Result<()> {
        let url = format!(
            "{}/judge/{}/testset/{}/",
            self.base_url, request_id, testset_id
        );
        self.patch(&url, result).await
    }

    /// `PATCH /judge/{request_id}/testset/{testset_id}/testcase/{testcase_id}/`.
    pub async fn set_testcase_judge_result(
        &self,
        request_id: i64,
        testset_id: i64,
        testcase_id: i64,
        result: &TestCaseJudgeResult,
    ) -> Result<()> {
        let url = format!(
            "{}/judge/{}/testset/{}/testcase/{}/",
            self.base_url, request_id, testset_id, testcase_id
        );
        self.patch(&url, result).await
    }

    async fn patch<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let resp = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(|_| Error::from(ErrorKind::InternalApiError(None)))?;

        self.check_ok(&resp)
    }

    fn check_ok(&self, resp: &reqwest::Response) -> Result<()> {
        if resp.status().is_success() {
            Ok(())
        } else {
            log::error!("front-office API returned {}", resp.status());
            Err(Error::from(ErrorKind::InternalApiError(Some(resp.status()))))
        }
    }
}
