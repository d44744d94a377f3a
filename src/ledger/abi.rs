/// Typed contract surface for the two on-chain collaborators.
///
/// The registry contract anchors records and holds access-control state;
/// the token contract covers pricing and spending allowance. Events are
/// decoded against these schemas rather than matched by name strings, so
/// a confirmation whose logs don't decode is an explicit degraded case.
use alloy::sol;

sol! {
    /// Record registry contract.
    contract NotaryRegistry {
        event RecordStored(
            uint256 indexed recordId,
            address indexed submitter,
            bytes32 requestHash,
            bytes32 responseHash,
            string archiveCid,
            uint8 visibility,
            uint256 timestamp
        );

        event BatchRecordStored(
            uint256 indexed firstRecordId,
            address indexed submitter,
            uint256 count,
            string archiveCid
        );

        event TokensCollected(address indexed payer, uint256 amount);
        event AccessGranted(uint256 indexed recordId, address indexed viewer);
        event AccessRevoked(uint256 indexed recordId, address indexed viewer);

        function storeAPIRecord(
            bytes32 requestHash,
            bytes32 responseHash,
            string archiveCid,
            uint8 visibility
        ) returns (uint256);

        function storeBatchRecords(
            bytes32[] requestHashes,
            bytes32[] responseHashes,
            string archiveCid,
            uint8 visibility
        ) returns (uint256);

        function verifyRecord(uint256 recordId) view returns (
            bool exists,
            bytes32 requestHash,
            bytes32 responseHash,
            uint256 timestamp,
            address submitter,
            string archiveCid,
            uint8 visibility
        );

        function grantAccess(uint256 recordId, address viewer);
        function revokeAccess(uint256 recordId, address viewer);

        function getPricingInfo() view returns (
            uint256 singlePrice,
            uint256 batchPrice,
            uint256 burnRate
        );

        function getStatistics() view returns (
            uint256 totalRecords,
            uint256 totalBatches,
            uint256 tokensBurned
        );

        function userRecordCount(address user) view returns (uint256);
        function sharedAccess(uint256 recordId) view returns (address[] viewers);
    }

    /// Fungible-token contract (the slice of ERC-20 the notary touches).
    contract NotaryToken {
        function balanceOf(address owner) view returns (uint256);
        function allowance(address owner, address spender) view returns (uint256);
        function approve(address spender, uint256 value) returns (bool);
    }
}
