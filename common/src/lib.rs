// エラーハンドリング
pub mod error;
// 定数
pub mod constants;
// シリアライゼーションヘルパー
pub mod serialization;
// RSA暗号関連
pub mod rsa;
// 楕円曲線 (NIST P-256) 関連
pub mod curve;
// OpenPGP 鍵の読み込み
pub mod keys;
// ブラインド署名 (要求者側)
pub mod blinding;
// 鍵署名パケット
pub mod packet;
// ワイヤ上のメッセージ
pub mod models;
// 署名サーバーとの通信
pub mod transport;
// 署名者側の処理
pub mod signer;

#[cfg(test)]
pub(crate) mod testing;

pub use blinding::{
    create_blinder_for_key_manager, hashed_token, AnyBlinder, Blinder, BlinderState,
    ImplementationHint,
};
pub use error::{BlindingError, ProtocolError, SignerError};
pub use keys::{KeyManager, SignerKeyPair};
pub use packet::BlindSignaturePacket;
pub use serialization::{biguint_to_radix32, radix32_to_biguint};
pub use signer::SignerService;
pub use transport::{HttpTransport, Transport};
