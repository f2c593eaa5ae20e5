//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum shared by the server and the client.

/// エラー種別の列挙体
///
/// 接続ごとのエラーと起動時のエラーを分類します。
/// 分類はログレベルの選択と、プロセスを止めるべきかの判定に使われます。
///
/// ## Notes
/// * `non_exhaustive` - 将来的に列挙子が追加される可能性があることを示す
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Transport;
/// assert_eq!(kind.as_str(), "Transport");
/// assert!(!kind.is_fatal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// プロトコル違反: 不正なフレーム、順序違反、サイズ超過
    Protocol,
    /// PoW 検証失敗: 作業量不足、期限切れ、不正なチャレンジ
    ProofOfWork,
    /// 通信エラー: タイムアウト、リセット、切断
    Transport,
    /// リソースエラー: 引用文プロバイダの失敗
    Resource,
    /// 設定エラー: 環境変数の値が不正
    Configuration,
    /// 致命的エラー: 起動時の bind 失敗など
    Fatal,
}

impl ErrorKind {
    /// 表示用の文字列表現を取得
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::ProofOfWork.as_str(), "Proof of Work");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Protocol => "Protocol",
            ErrorKind::ProofOfWork => "Proof of Work",
            ErrorKind::Transport => "Transport",
            ErrorKind::Resource => "Resource",
            ErrorKind::Configuration => "Configuration",
            ErrorKind::Fatal => "Fatal",
        }
    }

    /// プロセスを停止すべきエラーかどうかを判定
    ///
    /// 起動時にしか発生しない種別は `true` を返します。
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Fatal | ErrorKind::Configuration)
    }

    /// 相手側の不正な振る舞いが原因かどうかを判定
    ///
    /// これらのエラーは攻撃の兆候として warn で記録すべきです。
    #[inline]
    pub const fn is_peer_abuse(&self) -> bool {
        matches!(self, ErrorKind::Protocol | ErrorKind::ProofOfWork)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
