//! Peg-in records.

use bitcoin::consensus::encode::{self, Decodable, Encodable};
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::{io, Amount, BlockHash, OutPoint, Transaction, Txid};
use sidecoin_mainchain::{ClientError, MainchainClient};

/// A verified peg-in.
///
/// References the mainchain transaction that funded the sidechain and the
/// block it was confirmed in. No local consensus proof is computed: deposit
/// validity is a deliberate trust boundary on the mainchain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Sidechain slot the deposit pays into.
    pub sidechain: u8,
    /// Deposited value.
    pub amount: Amount,
    /// The mainchain deposit transaction.
    pub deposit_tx: Transaction,
    /// Output index funding the sidechain.
    pub index: u32,
    /// Position of the transaction within its mainchain block.
    pub tx_index: u32,
    /// Mainchain block the deposit was confirmed in.
    pub mainchain_block: BlockHash,
}

impl Deposit {
    /// Txid of the deposit transaction.
    pub fn txid(&self) -> Txid {
        self.deposit_tx.compute_txid()
    }

    /// The outpoint carrying the deposited value.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid(),
            vout: self.index,
        }
    }

    /// Asks the mainchain to confirm that the deposit's block and
    /// transaction exist and match.
    pub fn verify<C: MainchainClient>(&self, client: &C) -> Result<bool, ClientError> {
        client.verify_deposit(&self.mainchain_block, &self.txid(), self.tx_index)
    }

    /// Serializes the record.
    pub fn encode(&self) -> Vec<u8> {
        serialize(self)
    }

    /// Parses a record, rejecting trailing bytes.
    pub fn decode(data: &[u8]) -> Result<Self, encode::Error> {
        deserialize(data)
    }
}

impl Encodable for Deposit {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = 0;
        len += self.sidechain.consensus_encode(w)?;
        len += self.amount.to_sat().consensus_encode(w)?;
        len += self.index.consensus_encode(w)?;
        len += self.tx_index.consensus_encode(w)?;
        len += self.mainchain_block.consensus_encode(w)?;
        len += self.deposit_tx.consensus_encode(w)?;
        Ok(len)
    }
}

impl Decodable for Deposit {
    fn consensus_decode<R: io::BufRead + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let sidechain = u8::consensus_decode(r)?;
        let amount = Amount::from_sat(u64::consensus_decode(r)?);
        let index = u32::consensus_decode(r)?;
        let tx_index = u32::consensus_decode(r)?;
        let mainchain_block = BlockHash::consensus_decode(r)?;
        let deposit_tx = Transaction::consensus_decode(r)?;

        Ok(Self {
            sidechain,
            amount,
            deposit_tx,
            index,
            tx_index,
            mainchain_block,
        })
    }
}
