use std::sync::Arc;

use museum::{config::Config, database::Store, pinning::is_cid_v0, router, state::AppState};
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    base: String,
    client: Client,
    _uploads: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(Store::seeded()).await
    }

    async fn start_with(store: Store) -> Self {
        let uploads = TempDir::new().unwrap();
        let state = AppState::with_store(Config::local(uploads.path()), store).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Self {
            base: format!("http://{address}/api"),
            client: Client::new(),
            _uploads: uploads,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();

        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();

        (status, response.json().await.unwrap())
    }

    async fn upload(&self, title: &str, bytes: &[u8]) -> (StatusCode, Value) {
        self.upload_as(title, bytes, "image/png").await
    }

    async fn upload_as(
        &self,
        title: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> (StatusCode, Value) {
        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes.to_vec())
                    .file_name(format!("{title}.png"))
                    .mime_str(content_type)
                    .unwrap(),
            )
            .text("title", title.to_string())
            .text("description", format!("{title} on canvas"))
            .text("artistAddress", "0xArtist")
            .text("price", "0.25");

        let response = self
            .client
            .post(self.url("/artworks/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = response.status();

        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_me_is_fetch_or_create() {
    let server = TestServer::start().await;

    let (status, first) = server.get("/users/me/0xAbC123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["role"], "visitor");
    assert_eq!(first["isDaoMember"], false);

    let (_, second) = server.get("/users/me/0xabc123").await;
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn test_create_user_validation_and_duplicates() {
    let server = TestServer::start().await;

    let (status, user) = server
        .post("/users", json!({ "walletAddress": "0xPainter", "role": "artist" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "artist");

    let (status, body) = server
        .post("/users", json!({ "walletAddress": "0xPAINTER", "role": "visitor" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Wallet 0xPAINTER is already registered");

    let (status, body) = server.post("/users", json!({ "role": "artist" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_second_vote_is_conflict() {
    let server = TestServer::start().await;
    let ballot = json!({ "proposalId": "prop-1", "voteType": "for", "voterAddress": "0xVoter" });

    let (status, body) = server.post("/proposals/vote", ballot.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vote"]["votingPower"], "1");

    let (status, body) = server.post("/proposals/vote", ballot).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already voted on this proposal");

    let (_, votes) = server.get("/proposals/prop-1/votes").await;
    assert_eq!(votes.as_array().unwrap().len(), 1);

    let (_, proposals) = server.get("/proposals").await;
    let prop = &proposals.as_array().unwrap()[0];
    assert_eq!(prop["proposalId"], "prop-1");
    assert_eq!(prop["votesFor"], 1);
}

#[tokio::test]
async fn test_vote_validation() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post("/proposals/vote", json!({ "proposalId": "prop-1", "voteType": "for" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Voter address required");

    let (status, _) = server
        .post(
            "/proposals/vote",
            json!({ "proposalId": "prop-1", "voteType": "maybe", "voterAddress": "0x1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post(
            "/proposals/vote",
            json!({ "proposalId": "prop-77", "voteType": "for", "voterAddress": "0x1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Proposal prop-77 not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_votes() {
    let server = Arc::new(TestServer::start().await);
    let mut handles = Vec::new();

    for i in 0..16 {
        let server = server.clone();
        let vote_type = ["for", "against", "abstain"][i % 3];

        handles.push(tokio::spawn(async move {
            let (status, _) = server
                .post(
                    "/proposals/vote",
                    json!({ "proposalId": "prop-2", "voteType": vote_type, "voterAddress": "0xRacer" }),
                )
                .await;
            status
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);

    let (_, votes) = server.get("/proposals/prop-2/votes").await;
    let votes = votes.as_array().unwrap();
    assert_eq!(votes.len(), 1);

    let (_, proposals) = server.get("/proposals").await;
    let prop = proposals
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["proposalId"] == "prop-2")
        .unwrap();

    let total = ["votesFor", "votesAgainst", "votesAbstain"]
        .iter()
        .map(|key| prop[*key].as_u64().unwrap())
        .sum::<u64>();
    assert_eq!(total, 1);

    let counter = match votes[0]["voteType"].as_str().unwrap() {
        "for" => "votesFor",
        "against" => "votesAgainst",
        _ => "votesAbstain",
    };
    assert_eq!(prop[counter], 1);
}

#[tokio::test]
async fn test_closed_proposal_rejects_votes() {
    let server = TestServer::start().await;

    let (status, proposal) = server
        .post(
            "/proposals",
            json!({
                "title": "Rotate the lobby installation",
                "description": "Swap the lobby piece every month",
                "proposerAddress": "0xCurator",
                "proposalType": "governance",
                "endTime": "2099-01-01T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proposal["proposalId"], "prop-3");
    assert_eq!(proposal["status"], "active");

    let response = server
        .client
        .patch(server.url(&format!("/proposals/{}", proposal["id"].as_str().unwrap())))
        .json(&json!({ "status": "passed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = server
        .post(
            "/proposals/vote",
            json!({ "proposalId": "prop-3", "voteType": "against", "voterAddress": "0xLate" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Proposal prop-3 is not open for voting");
}

#[tokio::test]
async fn test_create_proposal_requires_fields() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post("/proposals", json!({ "title": "Half a proposal" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_ticket_grants_gallery_access() {
    let server = TestServer::start().await;

    let (_, check) = server.get("/tickets/check/0xVisitor").await;
    assert_eq!(check["hasValidTicket"], false);
    assert_eq!(check["tickets"], json!([]));

    let (status, body) = server
        .post("/tickets/purchase", json!({ "ticketType": "vip", "visitorAddress": "0xVisitor" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["price"], "0.05");
    assert_eq!(body["ticket"]["transactionHash"].as_str().unwrap().len(), 66);

    let (_, check) = server.get("/tickets/check/0xVISITOR").await;
    assert_eq!(check["hasValidTicket"], true);
    assert_eq!(check["tickets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ticket_purchase_validation() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post("/tickets/purchase", json!({ "ticketType": "general" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Visitor address required");

    let (status, body) = server
        .post("/tickets/purchase", json!({ "ticketType": "backstage", "visitorAddress": "0x1" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ticket type");

    let response = server
        .client
        .post(server.url("/tickets/purchase"))
        .header("x-wallet-address", "0xFromHeader")
        .json(&json!({ "ticketType": "general" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, check) = server.get("/tickets/check/0xfromheader").await;
    assert_eq!(check["hasValidTicket"], true);
}

#[tokio::test]
async fn test_join_dao_with_header_only() {
    let server = TestServer::start().await;

    let (_, before) = server.get("/users/me/0xMember").await;
    assert_eq!(before["isDaoMember"], false);

    let response = server
        .client
        .post(server.url("/dao/join"))
        .header("x-wallet-address", "0xMember")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], before["id"]);
    assert_eq!(body["user"]["isDaoMember"], true);

    let (status, body) = server.post("/dao/join", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Wallet address required");
}

#[tokio::test]
async fn test_upload_falls_back_to_local_storage() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("Dawn", b"\x89PNG dawn").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pinnedTo"], "local");

    let hash = body["ipfsHash"].as_str().unwrap();
    assert!(is_cid_v0(hash));
    assert!(body["metadataUri"].as_str().unwrap().starts_with("ipfs://Qm"));
    assert_eq!(body["artwork"]["royaltyPercentage"], "5");
    assert_eq!(body["artwork"]["price"], "0.25");

    let response = server
        .client
        .get(server.url(&format!("/images/{hash}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"\x89PNG dawn");
}

#[tokio::test]
async fn test_uploaded_markup_is_served_opaque() {
    let server = TestServer::start().await;
    let page = b"<html><script>alert(document.cookie)</script></html>";

    let (status, body) = server.upload_as("Trap", page, "text/html").await;
    assert_eq!(status, StatusCode::OK);

    let hash = body["ipfsHash"].as_str().unwrap();
    let response = server
        .client
        .get(server.url(&format!("/images/{hash}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/octet-stream");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.bytes().await.unwrap().as_ref(), page);
}

#[tokio::test]
async fn test_upload_requires_file() {
    let server = TestServer::start().await;

    let form = Form::new().text("title", "Nothing").text("artistAddress", "0xArtist");
    let response = server
        .client
        .post(server.url("/artworks/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_artworks_listed_newest_first() {
    let server = TestServer::start().await;

    for title in ["One", "Two", "Three"] {
        let (status, _) = server.upload(title, title.as_bytes()).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, artworks) = server.get("/artworks").await;
    let titles: Vec<&str> = artworks
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Three", "Two", "One"]);

    let (_, mine) = server.get("/artworks/my/0xartist").await;
    assert_eq!(mine.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_purchase_recording() {
    let server = TestServer::start().await;
    let (_, uploaded) = server.upload("Dusk", b"dusk").await;

    let (status, body) = server
        .post(
            "/artworks/purchase",
            json!({
                "artworkId": uploaded["artwork"]["id"],
                "buyerAddress": "0xCollector",
                "price": "0.25",
                "transactionHash": "0xfeed",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purchase"]["artistAddress"], "0xArtist");

    let (status, purchases) = server
        .get(&format!("/artworks/{}/purchases", uploaded["artwork"]["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let purchases = purchases.as_array().unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["buyerAddress"], "0xCollector");

    let (status, _) = server
        .post(
            "/artworks/purchase",
            json!({
                "artworkId": "7d1f6c2e-0000-4000-8000-000000000000",
                "buyerAddress": "0xCollector",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .get("/artworks/7d1f6c2e-0000-4000-8000-000000000000/purchases")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/artworks/not-a-uuid/purchases").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid artwork id not-a-uuid");
}

#[tokio::test]
async fn test_unknown_paths_are_json_404() {
    let server = TestServer::start_with(Store::new()).await;

    let (status, body) = server.get("/does/not/exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, body) = server.get("/images/not-a-hash").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Image not found");

    let (status, body) = server.get("/proposals/prop-1/votes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Proposal prop-1 not found");

    let (_, health) = server.get("/health").await;
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_wrong_method_is_json_405() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/users").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    let (status, body) = server.get("/proposals/vote").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    let response = server.client.delete(server.url("/artworks")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn test_ticket_check_is_case_insensitive_beyond_ascii() {
    let server = TestServer::start().await;

    let (status, _) = server
        .post("/tickets/purchase", json!({ "ticketType": "general", "visitorAddress": "0xÉCOLE" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, check) = server.get("/tickets/check/0xécole").await;
    assert_eq!(check["hasValidTicket"], true);
    assert_eq!(check["tickets"].as_array().unwrap().len(), 1);
}
