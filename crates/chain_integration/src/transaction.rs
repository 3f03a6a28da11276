//! Transaction model shared by the worker, the wallet and the ledger.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{
    domain::{Amount, PrivateKey, PublicKey},
    protocol::SerializedTransaction,
};

/// Digest of a compiled circuit, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationKey(String);

impl VerificationKey {
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(STANDARD.encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A loaded contract definition, prior to compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    pub source_digest: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof_b64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContractCall {
    Deploy {
        contract: PublicKey,
        verification_key: VerificationKey,
        fund_new_account: bool,
    },
    Update {
        contract: PublicKey,
    },
}

impl ContractCall {
    pub fn contract(&self) -> &PublicKey {
        match self {
            ContractCall::Deploy { contract, .. } | ContractCall::Update { contract } => contract,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSignature {
    pub signer: PublicKey,
    pub signature_b64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub call: ContractCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<AuthorizationSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer_signature_b64: Option<String>,
}

impl Transaction {
    pub fn deploy(
        contract: PublicKey,
        verification_key: VerificationKey,
        fee_payer: PublicKey,
    ) -> Self {
        Self {
            call: ContractCall::Deploy {
                contract,
                verification_key,
                fund_new_account: true,
            },
            fee_payer: Some(fee_payer),
            signatures: Vec::new(),
            proof: None,
            fee_payer_signature_b64: None,
        }
    }

    pub fn update(contract: PublicKey) -> Self {
        Self {
            call: ContractCall::Update { contract },
            fee_payer: None,
            signatures: Vec::new(),
            proof: None,
            fee_payer_signature_b64: None,
        }
    }

    /// Commitment over the contract call alone. Proofs and contract signatures bind to
    /// this, so the wallet can still attach its fee payer afterwards.
    pub fn call_commitment(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match &self.call {
            ContractCall::Deploy {
                contract,
                verification_key,
                fund_new_account,
            } => {
                hasher.update(b"deploy");
                hasher.update(contract.as_bytes());
                hasher.update(verification_key.as_str().as_bytes());
                hasher.update([u8::from(*fund_new_account)]);
            }
            ContractCall::Update { contract } => {
                hasher.update(b"update");
                hasher.update(contract.as_bytes());
            }
        }
        hasher.finalize().into()
    }

    /// Commitment over the call plus the fee payer's terms.
    pub fn full_commitment(&self, fee: Amount, memo: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.call_commitment());
        if let Some(fee_payer) = &self.fee_payer {
            hasher.update(fee_payer.as_bytes());
        }
        hasher.update(fee.nanomina().to_le_bytes());
        hasher.update(memo.as_bytes());
        hasher.finalize().into()
    }

    pub fn sign(&mut self, key: &PrivateKey) {
        let signature = key.signing_key().sign(&self.call_commitment());
        let signer = key.to_public_key();
        self.signatures.retain(|existing| existing.signer != signer);
        self.signatures.push(AuthorizationSignature {
            signer,
            signature_b64: STANDARD.encode(signature.to_bytes()),
        });
    }

    pub fn verify_signature(&self, signer: &PublicKey) -> Result<()> {
        let entry = self
            .signatures
            .iter()
            .find(|entry| entry.signer == *signer)
            .ok_or_else(|| anyhow!("missing authorization signature from {signer}"))?;
        verify(signer, &entry.signature_b64, &self.call_commitment())
    }

    pub fn sign_as_fee_payer(&mut self, key: &PrivateKey, fee: Amount, memo: &str) {
        self.fee_payer = Some(key.to_public_key());
        let signature = key.signing_key().sign(&self.full_commitment(fee, memo));
        self.fee_payer_signature_b64 = Some(STANDARD.encode(signature.to_bytes()));
    }

    pub fn verify_fee_payer(&self, fee: Amount, memo: &str) -> Result<PublicKey> {
        let fee_payer = self
            .fee_payer
            .ok_or_else(|| anyhow!("transaction has no fee payer"))?;
        let signature = self
            .fee_payer_signature_b64
            .as_deref()
            .ok_or_else(|| anyhow!("transaction is not signed by its fee payer"))?;
        verify(&fee_payer, signature, &self.full_commitment(fee, memo))?;
        Ok(fee_payer)
    }

    pub fn to_transport(&self) -> Result<SerializedTransaction> {
        let json = serde_json::to_string(self).context("failed to encode transaction")?;
        Ok(SerializedTransaction(json))
    }

    pub fn from_transport(serialized: &SerializedTransaction) -> Result<Self> {
        serde_json::from_str(&serialized.0).context("failed to decode transaction")
    }
}

fn verify(signer: &PublicKey, signature_b64: &str, message: &[u8]) -> Result<()> {
    let bytes = STANDARD
        .decode(signature_b64)
        .context("signature is not valid base64")?;
    let bytes: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("signature has length {}, expected 64", bytes.len()))?;
    let verifying_key = signer.verifying_key()?;
    verifying_key
        .verify(message, &Signature::from_bytes(&bytes))
        .map_err(|_| anyhow!("signature from {signer} does not verify"))
}
