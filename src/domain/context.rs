use crate::domain::address::Address;

/// Request-scoped information about the block being processed.
#[derive(Debug, Clone, Default)]
pub struct Context {
    chain_id: String,
    height: i64,
    signers: Vec<Address>,
}

impl Context {
    pub fn new(chain_id: impl Into<String>, height: i64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            signers: Vec::new(),
        }
    }

    /// Attaches the addresses whose signatures were verified for this tx.
    pub fn with_signers(mut self, signers: Vec<Address>) -> Self {
        self.signers = signers;
        self
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn signers(&self) -> &[Address] {
        &self.signers
    }
}

/// Answers which addresses authorized the current transaction.
pub trait Authenticator: Send + Sync {
    fn signers(&self, ctx: &Context) -> Vec<Address>;

    fn has_address(&self, ctx: &Context, address: &Address) -> bool {
        self.signers(ctx).contains(address)
    }

    /// The first signer, used as the default fee payer.
    fn main_signer(&self, ctx: &Context) -> Option<Address> {
        self.signers(ctx).first().copied()
    }
}

/// Trusts the signer set that signature verification stored in the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignerAuth;

impl Authenticator for SignerAuth {
    fn signers(&self, ctx: &Context) -> Vec<Address> {
        ctx.signers().to_vec()
    }

    fn has_address(&self, ctx: &Context, address: &Address) -> bool {
        ctx.signers().contains(address)
    }
}
