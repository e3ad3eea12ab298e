use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Key namespace for access-key policy records.
const AK_PREFIX: &str = "#ak#";
/// Key namespace for user → access-key records.
const USER_PREFIX: &str = "#user#";
/// Key namespace for volume → access-key records.
const VOL_PREFIX: &str = "#vol#";

/// Replicated-log operation codes for user records.
#[allow(non_snake_case)]
pub mod UserOp {
    pub const ADD_AK_POLICY: u32 = 1;
    pub const DELETE_AK_POLICY: u32 = 2;
    pub const UPDATE_AK_POLICY: u32 = 3;
    pub const ADD_USER_AK: u32 = 4;
    pub const DELETE_USER_AK: u32 = 5;
    pub const ADD_VOL_AK: u32 = 6;
    pub const DELETE_VOL_AK: u32 = 7;
    pub const UPDATE_VOL_AK: u32 = 8;
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("raft submit failed: {0}")]
    Submit(String),

    #[error("metadata store read failed: {0}")]
    Store(String),

    #[error("decode user record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One command applied through the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftCmd {
    pub op: u32,
    pub k: String,
    pub v: Vec<u8>,
}

/// Submit seam into the metadata raft group; the consensus machinery
/// itself lives outside this crate.
pub trait RaftPartition: Send + Sync {
    fn submit(&self, cmd: Vec<u8>) -> Result<(), UserStoreError>;
}

/// Read seam into the applied metadata store, for startup loads.
pub trait MetaStore: Send + Sync {
    fn seek_for_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, UserStoreError>;
}

/// Policy attached to one access key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AkPolicy {
    pub access_key: String,
    pub secret_key: String,
    pub policies: Vec<String>,
    pub user_id: String,
}

/// Access key owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserAk {
    pub user_id: String,
    pub access_key: String,
}

/// Access keys granted on one volume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolAk {
    pub vol: String,
    pub access_keys: Vec<String>,
}

/// User credential records on the master, synchronized through the
/// replicated log. Mutations are submitted as [`RaftCmd`]s; the applied
/// state is re-read from the metadata store on startup.
pub struct UserStore {
    partition: Arc<dyn RaftPartition>,
    ak_store: DashMap<String, AkPolicy>,
    user_ak: DashMap<String, UserAk>,
    vol_aks: DashMap<String, VolAk>,
}

impl UserStore {
    pub fn new(partition: Arc<dyn RaftPartition>) -> Self {
        Self {
            partition,
            ak_store: DashMap::new(),
            user_ak: DashMap::new(),
            vol_aks: DashMap::new(),
        }
    }

    fn submit(&self, cmd: &RaftCmd) -> Result<(), UserStoreError> {
        let raw = serde_json::to_vec(cmd)?;
        self.partition.submit(raw)
    }

    fn sync_put_ak_policy(&self, op: u32, policy: &AkPolicy) -> Result<(), UserStoreError> {
        self.submit(&RaftCmd {
            op,
            k: format!("{}{}", AK_PREFIX, policy.access_key),
            v: serde_json::to_vec(policy)?,
        })
    }

    pub fn sync_add_ak_policy(&self, policy: &AkPolicy) -> Result<(), UserStoreError> {
        self.sync_put_ak_policy(UserOp::ADD_AK_POLICY, policy)
    }

    pub fn sync_delete_ak_policy(&self, policy: &AkPolicy) -> Result<(), UserStoreError> {
        self.sync_put_ak_policy(UserOp::DELETE_AK_POLICY, policy)
    }

    pub fn sync_update_ak_policy(&self, policy: &AkPolicy) -> Result<(), UserStoreError> {
        self.sync_put_ak_policy(UserOp::UPDATE_AK_POLICY, policy)
    }

    fn sync_put_user_ak(&self, op: u32, user_ak: &UserAk) -> Result<(), UserStoreError> {
        self.submit(&RaftCmd {
            op,
            k: format!("{}{}", USER_PREFIX, user_ak.user_id),
            v: serde_json::to_vec(user_ak)?,
        })
    }

    pub fn sync_add_user_ak(&self, user_ak: &UserAk) -> Result<(), UserStoreError> {
        self.sync_put_user_ak(UserOp::ADD_USER_AK, user_ak)
    }

    pub fn sync_delete_user_ak(&self, user_ak: &UserAk) -> Result<(), UserStoreError> {
        self.sync_put_user_ak(UserOp::DELETE_USER_AK, user_ak)
    }

    fn sync_put_vol_ak(&self, op: u32, vol_ak: &VolAk) -> Result<(), UserStoreError> {
        self.submit(&RaftCmd {
            op,
            k: format!("{}{}", VOL_PREFIX, vol_ak.vol),
            v: serde_json::to_vec(vol_ak)?,
        })
    }

    pub fn sync_add_vol_ak(&self, vol_ak: &VolAk) -> Result<(), UserStoreError> {
        self.sync_put_vol_ak(UserOp::ADD_VOL_AK, vol_ak)
    }

    pub fn sync_delete_vol_ak(&self, vol_ak: &VolAk) -> Result<(), UserStoreError> {
        self.sync_put_vol_ak(UserOp::DELETE_VOL_AK, vol_ak)
    }

    pub fn sync_update_vol_ak(&self, vol_ak: &VolAk) -> Result<(), UserStoreError> {
        self.sync_put_vol_ak(UserOp::UPDATE_VOL_AK, vol_ak)
    }

    /// Repopulate the access-key map from applied state.
    pub fn load_ak_store(&self, store: &dyn MetaStore) -> Result<(), UserStoreError> {
        for value in store.seek_for_prefix(AK_PREFIX.as_bytes())? {
            let policy: AkPolicy = serde_json::from_slice(&value)?;
            info!(access_key = %policy.access_key, "loaded access key policy");
            self.ak_store.insert(policy.access_key.clone(), policy);
        }
        Ok(())
    }

    /// Repopulate the user → access-key map from applied state.
    pub fn load_user_aks(&self, store: &dyn MetaStore) -> Result<(), UserStoreError> {
        for value in store.seek_for_prefix(USER_PREFIX.as_bytes())? {
            let user_ak: UserAk = serde_json::from_slice(&value)?;
            info!(user = %user_ak.user_id, "loaded user access key");
            self.user_ak.insert(user_ak.user_id.clone(), user_ak);
        }
        Ok(())
    }

    /// Repopulate the volume → access-key map from applied state.
    pub fn load_vol_aks(&self, store: &dyn MetaStore) -> Result<(), UserStoreError> {
        for value in store.seek_for_prefix(VOL_PREFIX.as_bytes())? {
            let vol_ak: VolAk = serde_json::from_slice(&value)?;
            info!(vol = %vol_ak.vol, "loaded volume access keys");
            self.vol_aks.insert(vol_ak.vol.clone(), vol_ak);
        }
        Ok(())
    }

    pub fn ak_policy(&self, access_key: &str) -> Option<AkPolicy> {
        self.ak_store.get(access_key).map(|r| r.clone())
    }

    pub fn user_ak(&self, user_id: &str) -> Option<UserAk> {
        self.user_ak.get(user_id).map(|r| r.clone())
    }

    pub fn vol_ak(&self, vol: &str) -> Option<VolAk> {
        self.vol_aks.get(vol).map(|r| r.clone())
    }
}
