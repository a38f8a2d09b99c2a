use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTMessage {
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: [u8; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "v", with = "serde_bytes")]
    pub version: Option<[u8; 4]>,

    #[serde(flatten)]
    pub variant: DHTMessageVariant,
}

impl DHTMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<DHTMessage, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

/// Just enough of a message to answer it with an error, when the rest of it
/// failed to parse.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DHTMessageHeader {
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: [u8; 4],

    #[serde(rename = "y")]
    pub kind: String,

    #[serde(default, rename = "q")]
    pub method: Option<String>,
}

impl DHTMessageHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<DHTMessageHeader, serde_bencode::Error> {
        serde_bencode::from_bytes(bytes)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "y")]
pub enum DHTMessageVariant {
    #[serde(rename = "q")]
    Request(DHTRequestSpecific),

    #[serde(rename = "r")]
    Response(DHTResponseSpecific),

    #[serde(rename = "e")]
    Error(DHTErrorSpecific),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "q")]
pub enum DHTRequestSpecific {
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "a")]
        arguments: DHTNoArguments,
    },

    #[serde(rename = "find_successor")]
    FindSuccessor {
        #[serde(rename = "a")]
        arguments: DHTFindSuccessorRequestArguments,
    },

    #[serde(rename = "get_predecessor")]
    GetPredecessor {
        #[serde(rename = "a")]
        arguments: DHTNoArguments,
    },

    #[serde(rename = "get_successors")]
    GetSuccessors {
        #[serde(rename = "a")]
        arguments: DHTNoArguments,
    },

    #[serde(rename = "notify")]
    Notify {
        #[serde(rename = "a")]
        arguments: DHTNotifyRequestArguments,
    },

    #[serde(rename = "store")]
    Store {
        #[serde(rename = "a")]
        arguments: DHTStoreRequestArguments,
    },

    #[serde(rename = "fetch")]
    Fetch {
        #[serde(rename = "a")]
        arguments: DHTFetchRequestArguments,
    },
}

// Responses echo the method name, so unlike requests they need no guessing
// from the shape of the arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "q")]
pub enum DHTResponseSpecific {
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "r")]
        arguments: DHTNoArguments,
    },

    #[serde(rename = "find_successor")]
    FindSuccessor {
        #[serde(rename = "r")]
        arguments: DHTFindSuccessorResponseArguments,
    },

    #[serde(rename = "get_predecessor")]
    GetPredecessor {
        #[serde(rename = "r")]
        arguments: DHTGetPredecessorResponseArguments,
    },

    #[serde(rename = "get_successors")]
    GetSuccessors {
        #[serde(rename = "r")]
        arguments: DHTGetSuccessorsResponseArguments,
    },

    #[serde(rename = "notify")]
    Notify {
        #[serde(rename = "r")]
        arguments: DHTNotifyResponseArguments,
    },

    #[serde(rename = "store")]
    Store {
        #[serde(rename = "r")]
        arguments: DHTNoArguments,
    },

    #[serde(rename = "fetch")]
    Fetch {
        #[serde(rename = "r")]
        arguments: DHTFetchResponseArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTErrorSpecific {
    #[serde(rename = "e")]
    pub error_info: (i32, String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DHTNoArguments {}

// === FIND SUCCESSOR ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFindSuccessorRequestArguments {
    #[serde(with = "serde_bytes")]
    pub target: [u8; 8],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFindSuccessorResponseArguments {
    pub found: u8,

    pub node: String,
}

// === GET PREDECESSOR ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTGetPredecessorResponseArguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

// === GET SUCCESSORS ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTGetSuccessorsResponseArguments {
    pub nodes: Vec<String>,
}

// === NOTIFY ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTNotifyRequestArguments {
    pub node: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTNotifyResponseArguments {
    pub accepted: u8,
}

// === STORE ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTStoreRequestArguments {
    pub key: String,

    #[serde(with = "serde_bytes")]
    pub v: Box<[u8]>,
}

// === FETCH ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFetchRequestArguments {
    pub key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFetchResponseArguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "serde_bytes")]
    pub v: Option<Box<[u8]>>,
}
