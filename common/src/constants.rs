// RSA公開指数 (一般的に使用される65537)
pub const E: u32 = 65537;
// ワイヤ上の整数表現で使う基数
pub const WIRE_RADIX: u32 = 32;
// ブラインド係数を生成できる最小のモジュラスビット長
pub const MIN_RSA_BLINDING_BITS: u64 = 256;
// トークン欠落時にサーバーが返すエラーメッセージ
pub const MISSING_TOKEN: &str = "Missing Token...";
// 署名者側の秘密スカラーを保持する既定の秒数
pub const DEFAULT_SESSION_TTL_SECS: u64 = 300;

// RFC 4880 の署名パケット定数
pub const SIGNATURE_VERSION_V4: u8 = 4;
pub const PUBLIC_KEY_VERSION_V4: u8 = 4;
pub const SIG_TYPE_PERSONA: u8 = 0x11;
pub const HASH_ALGORITHM_SHA512: u8 = 10;
pub const SUBPACKET_CREATION_TIME: u8 = 2;
pub const SUBPACKET_ISSUER: u8 = 16;
pub const PACKET_TAG_SIGNATURE: u8 = 2;
pub const PACKET_TAG_PUBLIC_KEY: u8 = 6;

// 署名サーバーのエンドポイント
pub const RSA_PATH: &str = "/rsa";
pub const ANDREEV_INIT_PATH: &str = "/ecdsa/andreev/init";
pub const ANDREEV_SIGN_PATH: &str = "/ecdsa/andreev/sign";
pub const BUTUN_INIT_PATH: &str = "/ecdsa/butun/init";
pub const BUTUN_SIGN_PATH: &str = "/ecdsa/butun/sign";

// CLI が接続する既定の署名サーバー
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8888";
