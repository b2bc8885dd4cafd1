//! Records decoded from the bundled fixtures and the posts API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: u32,
    pub band_id: u32,
    pub name: String,
    pub year: u16,
    pub url: String,
}

/// `duration` is kept as the `m:ss` text found in the fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: u32,
    pub name: String,
    pub duration: String,
    pub band_id: u32,
    pub album_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_id: u32,
    pub id: u32,
    pub title: String,
    pub body: String,
}
